//! Content tokenizer: splits the text after a command alias into phrases,
//! flags and option flags.

use std::collections::BTreeMap;
use std::ops::Range;

/// Classification of a parsed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Phrase,
    Flag,
    OptionFlag,
}

/// One token of parsed content.
///
/// `raw` covers the token's source text plus the whitespace (or separator)
/// that follows it, so concatenating every `raw` reproduces the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub raw: String,
    /// Phrase text without quotes, the flag word, or the option value.
    pub value: String,
    /// Flag or option word that matched.
    pub key: Option<String>,
    /// Byte offset where the token text starts.
    pub start: usize,
    /// Byte offset one past the token text.
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrase {
    pub raw: String,
    pub value: String,
    pub start: usize,
    pub end: usize,
    /// Position of this phrase in `ParsedContent::all`.
    pub token_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagToken {
    pub key: String,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionFlagToken {
    pub key: String,
    pub value: Option<String>,
    pub raw: String,
}

/// Result of tokenizing one message body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedContent {
    pub all: Vec<Token>,
    pub phrases: Vec<Phrase>,
    pub flags: Vec<FlagToken>,
    pub option_flags: Vec<OptionFlagToken>,
    /// The whole input when it holds no token at all, e.g. only whitespace.
    pub trailing: String,
}

impl ParsedContent {
    fn push(&mut self, token: Token) {
        let token_index = self.all.len();
        match token.kind {
            TokenKind::Phrase => self.phrases.push(Phrase {
                raw: token.raw.clone(),
                value: token.value.clone(),
                start: token.start,
                end: token.end,
                token_index,
            }),
            TokenKind::Flag => self.flags.push(FlagToken {
                key: token.key.clone().unwrap_or_default(),
                raw: token.raw.clone(),
            }),
            TokenKind::OptionFlag => self.option_flags.push(OptionFlagToken {
                key: token.key.clone().unwrap_or_default(),
                value: (!token.value.is_empty()).then(|| token.value.clone()),
                raw: token.raw.clone(),
            }),
        }
        self.all.push(token);
    }

    pub fn phrase_values(&self) -> Vec<&str> {
        self.phrases.iter().map(|p| p.value.as_str()).collect()
    }

    pub fn has_flag(&self, word: &str) -> bool {
        self.flags.iter().any(|f| f.key == word)
    }

    /// Value of the last occurrence of an option word.
    pub fn option(&self, word: &str) -> Option<&str> {
        self.option_flags
            .iter()
            .rev()
            .find(|o| o.key == word)
            .and_then(|o| o.value.as_deref())
    }

    /// Flags present, keyed by the flag word without leading dashes.
    pub fn flag_map(&self) -> BTreeMap<String, bool> {
        self.flags
            .iter()
            .map(|f| (normalize_word(&f.key), true))
            .collect()
    }

    /// Option values, keyed by the option word without dashes or `=`/`:`.
    pub fn option_map(&self) -> BTreeMap<String, Option<String>> {
        self.option_flags
            .iter()
            .map(|o| (normalize_word(&o.key), o.value.clone()))
            .collect()
    }

    /// Concatenated raw text of every token; equals the parsed input.
    pub fn reconstruct(&self) -> String {
        let mut text: String = self.all.iter().map(|t| t.raw.as_str()).collect();
        text.push_str(&self.trailing);
        text
    }
}

fn normalize_word(word: &str) -> String {
    word.trim_start_matches('-')
        .trim_end_matches(['=', ':'])
        .to_string()
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Tokenizer configuration for one command.
#[derive(Debug, Clone)]
pub struct ContentParser {
    flag_words: Vec<String>,
    option_flag_words: Vec<String>,
    quoted: bool,
    separator: Option<String>,
}

impl Default for ContentParser {
    fn default() -> Self {
        Self {
            flag_words: Vec::new(),
            option_flag_words: Vec::new(),
            quoted: true,
            separator: None,
        }
    }
}

impl ContentParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flag_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flag_words = longest_first(words);
        self
    }

    pub fn with_option_flag_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.option_flag_words = longest_first(words);
        self
    }

    pub fn quoted(mut self, quoted: bool) -> Self {
        self.quoted = quoted;
        self
    }

    pub fn with_separator(mut self, separator: Option<String>) -> Self {
        self.separator = separator.filter(|s| !s.is_empty());
        self
    }

    pub fn flag_words(&self) -> &[String] {
        &self.flag_words
    }

    pub fn option_flag_words(&self) -> &[String] {
        &self.option_flag_words
    }

    pub fn parse(&self, content: &str) -> ParsedContent {
        let mut parsed = match &self.separator {
            Some(separator) => self.parse_separated(content, separator),
            None => self.parse_words(content),
        };
        if parsed.all.is_empty() {
            parsed.trailing = content.to_string();
        }
        parsed
    }

    fn parse_words(&self, content: &str) -> ParsedContent {
        let mut parsed = ParsedContent::default();
        let mut raw_start = 0;
        let mut pos = skip_whitespace(content, 0);

        while pos < content.len() {
            let (kind, value, key, end) = self.next_token(content, pos);
            let next = skip_whitespace(content, end);
            parsed.push(Token {
                kind,
                raw: content[raw_start..next].to_string(),
                value,
                key,
                start: pos,
                end,
            });
            raw_start = next;
            pos = next;
        }
        parsed
    }

    fn next_token(&self, content: &str, pos: usize) -> (TokenKind, String, Option<String>, usize) {
        let rest = &content[pos..];

        for word in &self.flag_words {
            if rest.starts_with(word.as_str()) && stands_alone(rest, word.len()) {
                let end = pos + word.len();
                return (TokenKind::Flag, word.clone(), Some(word.clone()), end);
            }
        }

        for word in &self.option_flag_words {
            if !rest.starts_with(word.as_str()) {
                continue;
            }
            let after = pos + word.len();
            let tail = &content[after..];
            let attached = word.ends_with('=') || word.ends_with(':');

            if attached {
                if tail.is_empty() || tail.starts_with(char::is_whitespace) {
                    return (TokenKind::OptionFlag, String::new(), Some(word.clone()), after);
                }
                let (value, end) = self.read_unit(content, after);
                return (TokenKind::OptionFlag, value, Some(word.clone()), end);
            }
            if let Some(stripped) = tail.strip_prefix('=') {
                if stripped.is_empty() || stripped.starts_with(char::is_whitespace) {
                    return (TokenKind::OptionFlag, String::new(), Some(word.clone()), after + 1);
                }
                let (value, end) = self.read_unit(content, after + 1);
                return (TokenKind::OptionFlag, value, Some(word.clone()), end);
            }
            if tail.is_empty() || tail.starts_with(char::is_whitespace) {
                let value_start = skip_whitespace(content, after);
                if value_start >= content.len() || self.is_word_at(content, value_start) {
                    return (TokenKind::OptionFlag, String::new(), Some(word.clone()), after);
                }
                let (value, end) = self.read_unit(content, value_start);
                return (TokenKind::OptionFlag, value, Some(word.clone()), end);
            }
            // Word is only a prefix of a longer token.
        }

        let (value, end) = self.read_unit(content, pos);
        (TokenKind::Phrase, value, None, end)
    }

    fn is_word_at(&self, content: &str, pos: usize) -> bool {
        let rest = &content[pos..];
        self.flag_words
            .iter()
            .chain(self.option_flag_words.iter())
            .any(|w| rest.starts_with(w.as_str()) && stands_alone(rest, w.len()))
    }

    /// Read one phrase unit (quoted span or run of non-whitespace) at `pos`.
    fn read_unit(&self, content: &str, pos: usize) -> (String, usize) {
        let rest = &content[pos..];
        if self.quoted {
            if let Some(open) = rest.chars().next().filter(|c| *c == '"' || *c == '“') {
                let close = if open == '“' { '”' } else { '"' };
                return read_quoted(content, pos + open.len_utf8(), close);
            }
        }
        let len = rest.find(char::is_whitespace).unwrap_or(rest.len());
        (rest[..len].to_string(), pos + len)
    }

    /// Segments between separators become phrases. Quoted spans may hold the
    /// separator, and flag or option words are lifted out of their segment.
    fn parse_separated(&self, content: &str, separator: &str) -> ParsedContent {
        let mut tokens = Vec::new();
        let mut segment = Segment::default();
        let mut pos = 0;

        while pos < content.len() {
            let rest = &content[pos..];
            if rest.starts_with(separator) {
                segment.close(&mut tokens);
                pos += separator.len();
                continue;
            }
            let Some(c) = rest.chars().next() else { break };
            if c.is_whitespace() {
                segment.space(pos, c.len_utf8());
                pos += c.len_utf8();
                continue;
            }
            if let Some(word) = self.flag_at(rest, separator) {
                let end = pos + word.len();
                tokens.push(Token {
                    kind: TokenKind::Flag,
                    raw: String::new(),
                    value: word.clone(),
                    key: Some(word.clone()),
                    start: pos,
                    end,
                });
                pos = end;
                continue;
            }
            if let Some((key, value, end)) = self.option_at(content, pos, separator) {
                tokens.push(Token {
                    kind: TokenKind::OptionFlag,
                    raw: String::new(),
                    value,
                    key: Some(key),
                    start: pos,
                    end,
                });
                pos = end;
                continue;
            }
            let (value, end) = self.read_separated_unit(content, pos, separator);
            segment.piece(content, pos..end, &value);
            pos = end;
        }
        segment.close(&mut tokens);

        tokens.sort_by_key(|t| t.start);
        let starts: Vec<usize> = tokens.iter().map(|t| t.start).collect();
        let mut parsed = ParsedContent::default();
        for (i, mut token) in tokens.into_iter().enumerate() {
            let raw_start = if i == 0 { 0 } else { starts[i] };
            let raw_end = starts.get(i + 1).copied().unwrap_or(content.len());
            token.raw = content[raw_start..raw_end].to_string();
            parsed.push(token);
        }
        parsed
    }

    fn flag_at<'w>(&'w self, rest: &str, separator: &str) -> Option<&'w String> {
        self.flag_words
            .iter()
            .find(|w| rest.starts_with(w.as_str()) && ends_unit(&rest[w.len()..], separator))
    }

    /// Option word at `pos` with its value and the end of the value.
    fn option_at(&self, content: &str, pos: usize, separator: &str) -> Option<(String, String, usize)> {
        let rest = &content[pos..];
        for word in &self.option_flag_words {
            if !rest.starts_with(word.as_str()) {
                continue;
            }
            let after = pos + word.len();
            let tail = &content[after..];
            let value_start = if word.ends_with('=') || word.ends_with(':') {
                after
            } else if tail.starts_with('=') {
                after + 1
            } else if ends_unit(tail, separator) {
                let next = skip_inline_whitespace(content, after, separator);
                let ahead = &content[next..];
                if ahead.is_empty()
                    || ahead.starts_with(separator)
                    || self.flag_at(ahead, separator).is_some()
                    || self.option_flag_words.iter().any(|w| ahead.starts_with(w.as_str()))
                {
                    return Some((word.clone(), String::new(), after));
                }
                next
            } else {
                continue;
            };
            if ends_unit(&content[value_start..], separator) {
                return Some((word.clone(), String::new(), value_start));
            }
            let (value, end) = self.read_separated_unit(content, value_start, separator);
            return Some((word.clone(), value, end));
        }
        None
    }

    /// Quoted span, or text up to whitespace or the separator.
    fn read_separated_unit(&self, content: &str, pos: usize, separator: &str) -> (String, usize) {
        let rest = &content[pos..];
        if self.quoted {
            if let Some(open) = rest.chars().next().filter(|c| *c == '"' || *c == '“') {
                let close = if open == '“' { '”' } else { '"' };
                return read_quoted(content, pos + open.len_utf8(), close);
            }
        }
        let len = rest
            .char_indices()
            .find(|(i, c)| c.is_whitespace() || rest[*i..].starts_with(separator))
            .map_or(rest.len(), |(i, _)| i);
        (rest[..len].to_string(), pos + len)
    }
}

/// Phrase text collected for one separated segment.
#[derive(Debug, Default)]
struct Segment {
    value: String,
    span: Option<Range<usize>>,
    /// First whitespace run after the last piece.
    gap: Option<Range<usize>>,
}

impl Segment {
    fn space(&mut self, at: usize, len: usize) {
        match &mut self.gap {
            None => self.gap = Some(at..at + len),
            Some(gap) if gap.end == at => gap.end += len,
            Some(_) => {}
        }
    }

    fn piece(&mut self, content: &str, range: Range<usize>, text: &str) {
        match &mut self.span {
            Some(span) => {
                if let Some(gap) = self.gap.take() {
                    self.value.push_str(&content[gap]);
                }
                span.end = range.end;
            }
            None => self.span = Some(range),
        }
        self.gap = None;
        self.value.push_str(text);
    }

    fn close(&mut self, tokens: &mut Vec<Token>) {
        let segment = std::mem::take(self);
        if let Some(span) = segment.span {
            tokens.push(Token {
                kind: TokenKind::Phrase,
                raw: String::new(),
                value: segment.value,
                key: None,
                start: span.start,
                end: span.end,
            });
        }
    }
}

fn ends_unit(tail: &str, separator: &str) -> bool {
    tail.is_empty() || tail.starts_with(char::is_whitespace) || tail.starts_with(separator)
}

fn skip_inline_whitespace(content: &str, pos: usize, separator: &str) -> usize {
    let rest = &content[pos..];
    rest.char_indices()
        .find(|(i, c)| !c.is_whitespace() || rest[*i..].starts_with(separator))
        .map_or(content.len(), |(i, _)| pos + i)
}

fn longest_first<I, S>(words: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut words: Vec<String> = words
        .into_iter()
        .map(Into::into)
        .filter(|w| !w.is_empty())
        .collect();
    words.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    words.dedup();
    words
}

fn stands_alone(rest: &str, len: usize) -> bool {
    rest[len..].is_empty() || rest[len..].starts_with(char::is_whitespace)
}

fn skip_whitespace(content: &str, pos: usize) -> usize {
    content[pos..]
        .find(|c: char| !c.is_whitespace())
        .map_or(content.len(), |i| pos + i)
}

/// Read a quoted span whose body starts at `pos`. An unterminated quote runs
/// to the end of the content.
fn read_quoted(content: &str, pos: usize, close: char) -> (String, usize) {
    let mut value = String::new();
    let mut chars = content[pos..].char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            if let Some(&(_, next)) = chars.peek() {
                if next == close || next == '\\' {
                    value.push(next);
                    chars.next();
                    continue;
                }
            }
            value.push(c);
        } else if c == close {
            return (value, pos + i + c.len_utf8());
        } else {
            value.push(c);
        }
    }
    (value.trim_end().to_string(), content.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> ContentParser {
        ContentParser::new()
            .with_flag_words(["--flag", "-v", "-vv"])
            .with_option_flag_words(["--opt", "limit:"])
    }

    #[test]
    fn parses_quotes_flags_and_options() {
        let parsed = parser().parse(r#"add "foo bar" --flag --opt=5"#);
        assert_eq!(parsed.phrase_values(), vec!["add", "foo bar"]);
        assert_eq!(parsed.flag_map(), BTreeMap::from([("flag".to_string(), true)]));
        assert_eq!(
            parsed.option_map(),
            BTreeMap::from([("opt".to_string(), Some("5".to_string()))])
        );
    }

    #[test]
    fn raw_tokens_reconstruct_input() {
        let inputs = [
            r#"add "foo bar" --flag --opt=5"#,
            "  leading   and trailing  ",
            r#"a "unterminated quote here"#,
            "limit:10 --opt \"x y\" tail",
            "",
            "   ",
        ];
        for input in inputs {
            assert_eq!(parser().parse(input).reconstruct(), input);
        }
    }

    #[test]
    fn flag_word_must_stand_alone() {
        let parsed = parser().parse("x --flagged foo--flag --flag");
        assert_eq!(parsed.phrase_values(), vec!["x", "--flagged", "foo--flag"]);
        assert_eq!(parsed.flags.len(), 1);
    }

    #[test]
    fn flag_words_are_case_sensitive() {
        let parsed = parser().parse("--FLAG");
        assert!(parsed.flags.is_empty());
        assert_eq!(parsed.phrase_values(), vec!["--FLAG"]);
    }

    #[test]
    fn longer_flag_word_wins() {
        let parsed = parser().parse("-vv -v");
        let keys: Vec<_> = parsed.flags.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["-vv", "-v"]);
    }

    #[test]
    fn option_takes_following_phrase() {
        let parsed = parser().parse(r#"--opt "two words" rest"#);
        assert_eq!(parsed.option("--opt"), Some("two words"));
        assert_eq!(parsed.phrase_values(), vec!["rest"]);
    }

    #[test]
    fn option_without_value_does_not_swallow_flags() {
        let parsed = parser().parse("--opt --flag");
        assert_eq!(parsed.option("--opt"), None);
        assert!(parsed.has_flag("--flag"));
    }

    #[test]
    fn attached_option_word() {
        let parsed = parser().parse("limit:10 go");
        assert_eq!(parsed.option("limit:"), Some("10"));
        assert_eq!(parsed.phrase_values(), vec!["go"]);
    }

    #[test]
    fn unterminated_quote_runs_to_end() {
        let parsed = parser().parse(r#"say "hello there"#);
        assert_eq!(parsed.phrase_values(), vec!["say", "hello there"]);
    }

    #[test]
    fn escaped_quotes_stay_in_phrase() {
        let parsed = parser().parse(r#""say \"hi\"" next"#);
        assert_eq!(parsed.phrase_values(), vec![r#"say "hi""#, "next"]);
    }

    #[test]
    fn smart_quotes_group_phrases() {
        let parsed = parser().parse("“foo bar” baz");
        assert_eq!(parsed.phrase_values(), vec!["foo bar", "baz"]);
    }

    #[test]
    fn quoting_can_be_disabled() {
        let parsed = ContentParser::new().quoted(false).parse(r#""foo bar""#);
        assert_eq!(parsed.phrase_values(), vec!["\"foo", "bar\""]);
    }

    #[test]
    fn only_flags_yields_no_phrases() {
        let parsed = parser().parse("--flag -v");
        assert!(parsed.phrases.is_empty());
        assert_eq!(parsed.flags.len(), 2);
    }

    #[test]
    fn separator_splits_segments() {
        let parser = parser().with_separator(Some(",".into()));
        let input = r#"a, b c ,--flag, "quoted, kept" , --opt=3,"#;
        let parsed = parser.parse(input);
        assert_eq!(parsed.phrase_values(), vec!["a", "b c", "quoted, kept"]);
        assert!(parsed.has_flag("--flag"));
        assert_eq!(parsed.option("--opt"), Some("3"));
        assert_eq!(parsed.reconstruct(), input);
    }

    #[test]
    fn separator_lifts_flags_out_of_segments() {
        let parser = parser().with_separator(Some(",".into()));
        let input = r#"x --flag, "a, b""#;
        let parsed = parser.parse(input);
        assert_eq!(parsed.phrase_values(), vec!["x", "a, b"]);
        assert!(parsed.has_flag("--flag"));
        assert_eq!(parsed.reconstruct(), input);

        let parsed = parser.parse("one --opt 7 two, three");
        assert_eq!(parsed.phrase_values(), vec!["one two", "three"]);
        assert_eq!(parsed.option("--opt"), Some("7"));
    }

    #[test]
    fn separator_without_quoting_splits_inside_quotes() {
        let parser = ContentParser::new()
            .quoted(false)
            .with_separator(Some(",".into()));
        let parsed = parser.parse(r#""a, b""#);
        assert_eq!(parsed.phrase_values(), vec!["\"a", "b\""]);
    }

    #[test]
    fn blank_input_keeps_its_whitespace() {
        let parsed = parser().parse("  \t ");
        assert!(parsed.all.is_empty());
        assert_eq!(parsed.reconstruct(), "  \t ");
    }

    #[test]
    fn phrase_positions_point_into_input() {
        let input = r#"one "two three""#;
        let parsed = parser().parse(input);
        let second = &parsed.phrases[1];
        assert_eq!(&input[second.start..second.end], "\"two three\"");
        assert_eq!(second.token_index, 1);
    }
}
