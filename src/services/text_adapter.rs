use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node};
use serde::Serialize;

use crate::models::platform::Platform;
use crate::publishers::utils::{ELLIPSIS, truncate_with_ellipsis};

pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;
pub const TELEGRAM_CAPTION_LIMIT: usize = 1024;
pub const VK_TEXT_LIMIT: usize = 16384;
pub const FACEBOOK_TEXT_LIMIT: usize = 63206;
pub const INSTAGRAM_CAPTION_LIMIT: usize = 2200;

static EXTRA_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

/// Text ready for one platform plus its length in characters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PlatformText {
    pub text: String,
    pub length: usize,
}

impl PlatformText {
    pub fn new(text: String) -> Self {
        let length = text.chars().count();
        Self { text, length }
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Markup dialect a platform understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// b/i/u/s/code/pre/a, entities escaped.
    TelegramHtml,
    /// `*bold*`, `_italic_`, `~strike~`.
    Markdown,
    Plain,
}

impl Dialect {
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Telegram => Dialect::TelegramHtml,
            Platform::Vk | Platform::Facebook => Dialect::Markdown,
            Platform::Instagram => Dialect::Plain,
        }
    }
}

pub fn message_limit(platform: Platform) -> usize {
    match platform {
        Platform::Telegram => TELEGRAM_MESSAGE_LIMIT,
        Platform::Vk => VK_TEXT_LIMIT,
        Platform::Facebook => FACEBOOK_TEXT_LIMIT,
        Platform::Instagram => INSTAGRAM_CAPTION_LIMIT,
    }
}

/// Converts a rich-text body into the platform's dialect, appends hashtags and
/// enforces the platform's message limit. Never fails.
pub fn adapt_text(body: &str, hashtags: &[String], platform: Platform) -> PlatformText {
    let dialect = Dialect::for_platform(platform);
    let mut text = render(body, dialect);
    if let Some(block) = hashtag_block(hashtags) {
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        match dialect {
            Dialect::TelegramHtml => text.push_str(&escape_html(&block)),
            _ => text.push_str(&block),
        }
    }
    let limit = message_limit(platform);
    let text = match dialect {
        Dialect::TelegramHtml => truncate_html(&text, limit),
        _ => truncate_with_ellipsis(&text, limit),
    };
    PlatformText::new(text)
}

#[derive(Clone, Copy)]
enum Token<'a> {
    Open { raw: &'a str, name: &'a str },
    Close { raw: &'a str, name: &'a str },
    /// One character or one whole entity.
    Text(&'a str),
}

impl<'a> Token<'a> {
    fn raw(&self) -> &'a str {
        match *self {
            Token::Open { raw, .. } | Token::Close { raw, .. } | Token::Text(raw) => raw,
        }
    }
}

fn next_token(rest: &str) -> Option<Token<'_>> {
    let first = rest.chars().next()?;
    if first == '<' {
        if let Some(end) = rest.find('>') {
            let raw = &rest[..=end];
            if let Some(inner) = raw.strip_prefix("</") {
                return Some(Token::Close { raw, name: inner.trim_end_matches('>').trim() });
            }
            let name = raw[1..]
                .split(|c: char| c.is_whitespace() || c == '>' || c == '/')
                .next()
                .unwrap_or_default();
            return Some(Token::Open { raw, name });
        }
    }
    if first == '&' {
        if let Some(end) = rest.char_indices().take(10).find(|&(_, c)| c == ';').map(|(i, _)| i) {
            if end > 1 && rest[1..end].chars().all(|c| c.is_ascii_alphanumeric() || c == '#') {
                return Some(Token::Text(&rest[..=end]));
            }
        }
    }
    Some(Token::Text(&rest[..first.len_utf8()]))
}

/// Cuts Telegram HTML to `max_chars` without splitting a tag or an entity.
/// Tags left open at the cut are closed before the ellipsis.
pub fn truncate_html(html: &str, max_chars: usize) -> String {
    if html.chars().count() <= max_chars {
        return html.to_string();
    }
    if max_chars <= ELLIPSIS.len() {
        return truncate_with_ellipsis(html, max_chars);
    }
    let budget = max_chars - ELLIPSIS.len();
    let closer_len = |name: &str| name.len() + 3;

    let mut out = String::with_capacity(html.len().min(budget * 4));
    let mut used = 0;
    // (name, byte offset of the opening tag in `out`, byte offset right after it)
    let mut open: Vec<(&str, usize, usize)> = Vec::new();
    let mut reserved = 0;
    let mut rest = html;

    while let Some(token) = next_token(rest) {
        let raw = token.raw();
        let len = raw.chars().count();
        match token {
            Token::Open { name, .. } => {
                if used + len + reserved + closer_len(name) > budget {
                    break;
                }
                let start = out.len();
                out.push_str(raw);
                open.push((name, start, out.len()));
                used += len;
                reserved += closer_len(name);
            }
            Token::Close { name, .. } => {
                let Some(pos) = open.iter().rposition(|(n, _, _)| n.eq_ignore_ascii_case(name)) else {
                    rest = &rest[raw.len()..];
                    continue;
                };
                // закрываем всё, что было открыто внутри
                let mut closing = String::new();
                for (inner, _, _) in open.drain(pos..).rev() {
                    reserved -= closer_len(inner);
                    closing.push_str(&format!("</{inner}>"));
                }
                used += closing.len();
                out.push_str(&closing);
            }
            Token::Text(_) => {
                if used + len + reserved > budget {
                    break;
                }
                out.push_str(raw);
                used += len;
            }
        }
        rest = &rest[raw.len()..];
    }

    // без пустых хвостовых тегов и пробелов перед многоточием
    loop {
        let trimmed = out.trim_end().len();
        out.truncate(trimmed);
        match open.last() {
            Some(&(_, start, end)) if end == out.len() => {
                out.truncate(start);
                open.pop();
            }
            _ => break,
        }
    }
    for (name, _, _) in open.iter().rev() {
        out.push_str(&format!("</{name}>"));
    }
    out.push_str(ELLIPSIS);
    out
}

/// Space-joined `#tag` list; blanks dropped, inner whitespace removed.
pub fn hashtag_block(hashtags: &[String]) -> Option<String> {
    let tags: Vec<String> = hashtags
        .iter()
        .map(|t| t.trim().trim_start_matches('#').split_whitespace().collect::<String>())
        .filter(|t| !t.is_empty())
        .map(|t| format!("#{t}"))
        .collect();
    if tags.is_empty() { None } else { Some(tags.join(" ")) }
}

/// Drops Telegram HTML tags and decodes the entities the adapter produced.
pub fn strip_markup(html: &str) -> String {
    TAG.replace_all(html, "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

/// Markup conversion only: no hashtags, no length limit.
pub fn render(body: &str, dialect: Dialect) -> String {
    if body.trim().is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(body);
    let mut renderer = Renderer::new(dialect);
    renderer.walk(fragment.root_element());

    let joined = renderer.out.lines().map(str::trim_end).collect::<Vec<_>>().join("\n");
    EXTRA_NEWLINES.replace_all(&joined, "\n\n").trim().to_string()
}

#[derive(Clone, Copy)]
enum Style {
    Bold,
    Italic,
    Underline,
    Strike,
    Code,
    Pre,
}

enum ListKind {
    Unordered,
    Ordered(usize),
}

struct Renderer {
    dialect: Dialect,
    out: String,
    pre_depth: usize,
    lists: Vec<ListKind>,
}

impl Renderer {
    fn new(dialect: Dialect) -> Self {
        Self { dialect, out: String::new(), pre_depth: 0, lists: Vec::new() }
    }

    fn walk(&mut self, el: ElementRef<'_>) {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => self.push_text(text),
                Node::Element(_) => {
                    if let Some(el) = ElementRef::wrap(child) {
                        self.element(el);
                    }
                }
                _ => {}
            }
        }
    }

    fn element(&mut self, el: ElementRef<'_>) {
        let name = el.value().name().to_ascii_lowercase();
        match name.as_str() {
            "script" | "style" | "head" | "title" => {}
            "br" => self.out.push('\n'),
            "p" | "blockquote" | "table" | "thead" | "tbody" | "tfoot" => {
                self.block_break();
                self.walk(el);
                self.block_break();
            }
            "div" | "article" | "section" | "aside" | "header" | "footer" | "nav" | "main" | "tr" => {
                self.line_break();
                self.walk(el);
                self.line_break();
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.block_break();
                self.styled(el, Style::Bold);
                self.block_break();
            }
            "ul" => self.list(el, ListKind::Unordered),
            "ol" => self.list(el, ListKind::Ordered(0)),
            "li" => self.list_item(el),
            "b" | "strong" => self.styled(el, Style::Bold),
            "i" | "em" => self.styled(el, Style::Italic),
            "u" | "ins" => self.styled(el, Style::Underline),
            "s" | "strike" | "del" => self.styled(el, Style::Strike),
            "code" => self.styled(el, Style::Code),
            "pre" => {
                self.line_break();
                self.pre_depth += 1;
                self.styled(el, Style::Pre);
                self.pre_depth -= 1;
                self.line_break();
            }
            "a" => self.link(el),
            "td" | "th" => {
                self.walk(el);
                self.out.push(' ');
            }
            _ => self.walk(el),
        }
    }

    fn markers(&self, style: Style) -> (&'static str, &'static str) {
        match (self.dialect, style) {
            (Dialect::TelegramHtml, Style::Bold) => ("<b>", "</b>"),
            (Dialect::TelegramHtml, Style::Italic) => ("<i>", "</i>"),
            (Dialect::TelegramHtml, Style::Underline) => ("<u>", "</u>"),
            (Dialect::TelegramHtml, Style::Strike) => ("<s>", "</s>"),
            (Dialect::TelegramHtml, Style::Code) => ("<code>", "</code>"),
            (Dialect::TelegramHtml, Style::Pre) => ("<pre>", "</pre>"),
            (Dialect::Markdown, Style::Bold) => ("*", "*"),
            (Dialect::Markdown, Style::Italic) => ("_", "_"),
            (Dialect::Markdown, Style::Strike) => ("~", "~"),
            _ => ("", ""),
        }
    }

    fn styled(&mut self, el: ElementRef<'_>, style: Style) {
        let (open, close) = self.markers(style);
        let mark = self.out.len();
        self.out.push_str(open);
        let inner = self.out.len();
        self.walk(el);
        if self.out[inner..].trim().is_empty() {
            self.out.truncate(mark);
        } else {
            self.out.push_str(close);
        }
    }

    fn link(&mut self, el: ElementRef<'_>) {
        let href = el.value().attr("href").map(str::trim).filter(|h| !h.is_empty());
        let Some(href) = href else {
            self.walk(el);
            return;
        };
        match self.dialect {
            Dialect::TelegramHtml => {
                let mark = self.out.len();
                self.out.push_str(&format!("<a href=\"{}\">", escape_attr(href)));
                let inner = self.out.len();
                self.walk(el);
                if self.out[inner..].trim().is_empty() {
                    self.out.truncate(mark);
                    self.push_raw(href);
                } else {
                    self.out.push_str("</a>");
                }
            }
            Dialect::Markdown | Dialect::Plain => {
                let inner = self.out.len();
                self.walk(el);
                let label = self.out[inner..].trim().to_string();
                if label.is_empty() || label == href {
                    self.out.truncate(inner);
                    self.push_raw(href);
                } else {
                    self.out.push_str(&format!(" ({href})"));
                }
            }
        }
    }

    fn list(&mut self, el: ElementRef<'_>, kind: ListKind) {
        self.line_break();
        self.lists.push(kind);
        self.walk(el);
        self.lists.pop();
        self.block_break();
    }

    fn list_item(&mut self, el: ElementRef<'_>) {
        self.line_break();
        let prefix = match self.lists.last_mut() {
            Some(ListKind::Ordered(n)) => {
                *n += 1;
                format!("{n}. ")
            }
            _ => "• ".to_string(),
        };
        self.out.push_str(&prefix);
        self.walk(el);
        self.out.push('\n');
    }

    fn at_line_start(&self) -> bool {
        self.out.is_empty() || self.out.ends_with('\n')
    }

    fn line_break(&mut self) {
        if !self.at_line_start() {
            self.out.push('\n');
        }
    }

    fn block_break(&mut self) {
        if self.out.is_empty() || self.out.ends_with("\n\n") {
            return;
        }
        self.line_break();
        self.out.push('\n');
    }

    fn push_text(&mut self, raw: &str) {
        if self.pre_depth > 0 {
            self.push_raw(raw);
            return;
        }
        let mut collapsed = String::with_capacity(raw.len());
        let mut prev_space = false;
        for ch in raw.chars() {
            if ch.is_whitespace() {
                if !prev_space {
                    collapsed.push(' ');
                }
                prev_space = true;
            } else {
                collapsed.push(ch);
                prev_space = false;
            }
        }
        let text = if self.at_line_start() || self.out.ends_with(' ') {
            collapsed.trim_start()
        } else {
            collapsed.as_str()
        };
        if !text.is_empty() {
            self.push_raw(text);
        }
    }

    fn push_raw(&mut self, text: &str) {
        match self.dialect {
            Dialect::TelegramHtml => self.out.push_str(&escape_html(text)),
            _ => self.out.push_str(text),
        }
    }
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(text: &str) -> String {
    escape_html(text).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(Platform::Telegram)]
    #[case(Platform::Vk)]
    #[case(Platform::Instagram)]
    #[case(Platform::Facebook)]
    fn empty_body_without_hashtags_is_empty(#[case] platform: Platform) {
        let adapted = adapt_text("", &[], platform);
        assert_eq!(adapted.text, "");
        assert_eq!(adapted.length, 0);
        assert!(adapt_text("<p>  </p>", &[], platform).is_empty());
    }

    #[rstest]
    #[case(Platform::Telegram, 4096)]
    #[case(Platform::Vk, 16384)]
    #[case(Platform::Instagram, 2200)]
    #[case(Platform::Facebook, 63206)]
    fn over_limit_text_is_cut_to_limit(#[case] platform: Platform, #[case] limit: usize) {
        let body = format!("<p>{}</p>", "a".repeat(limit + 100));
        let adapted = adapt_text(&body, &["tag".to_string()], platform);
        assert_eq!(adapted.length, limit);
        assert_eq!(adapted.text.chars().count(), limit);
        assert!(adapted.text.ends_with("..."));
    }

    #[test]
    fn telegram_html_keeps_supported_tags() {
        let body = "<p>Hello <strong>world</strong></p>\n<p>Second &amp; <em>line</em></p>";
        let adapted = adapt_text(body, &[], Platform::Telegram);
        assert_eq!(adapted.text, "Hello <b>world</b>\n\nSecond &amp; <i>line</i>");
    }

    #[test]
    fn telegram_links_and_headings() {
        let body = r#"<h2>News</h2><p>See <a href="https://x.org/?a=1&amp;b=2" target="_blank">this</a> <span>now</span></p>"#;
        let text = render(body, Dialect::TelegramHtml);
        assert_eq!(text, "<b>News</b>\n\nSee <a href=\"https://x.org/?a=1&amp;b=2\">this</a> now");
    }

    #[test]
    fn markdown_dialect_for_vk_and_facebook() {
        let body = r#"<p><b>Big</b> news, <a href="https://x.org">read</a> <s>old</s></p>"#;
        assert_eq!(adapt_text(body, &[], Platform::Vk).text, "*Big* news, read (https://x.org) ~old~");
        assert_eq!(adapt_text(body, &[], Platform::Facebook).text, "*Big* news, read (https://x.org) ~old~");
    }

    #[test]
    fn instagram_is_plain_text() {
        let body = "<h2>Title</h2>\n<ul>\n<li>one</li>\n<li><em>two</em></li>\n</ul><script>x()</script>";
        assert_eq!(adapt_text(body, &[], Platform::Instagram).text, "Title\n\n• one\n• two");
    }

    #[test]
    fn ordered_lists_are_numbered() {
        let text = render("<ol><li>a</li><li>b</li></ol><p>after</p>", Dialect::Plain);
        assert_eq!(text, "1. a\n2. b\n\nafter");
    }

    #[test]
    fn line_breaks_and_blank_runs() {
        let text = render("<p>one<br>two<br/><br/><br/><br/>three</p>", Dialect::Plain);
        assert_eq!(text, "one\ntwo\n\nthree");
    }

    #[test]
    fn hashtags_are_normalized_and_appended() {
        let tags = vec!["sale".to_string(), "#promo".to_string(), " ".to_string(), "big deal".to_string()];
        assert_eq!(hashtag_block(&tags).as_deref(), Some("#sale #promo #bigdeal"));
        let adapted = adapt_text("<p>50% off</p>", &["sale".to_string()], Platform::Facebook);
        assert_eq!(adapted.text, "50% off\n\n#sale");
        assert_eq!(adapt_text("", &["only".to_string()], Platform::Vk).text, "#only");
    }

    #[test]
    fn long_telegram_html_keeps_tags_balanced() {
        let body = format!("<p>{}<b>{}</b></p>", "a".repeat(4000), "b".repeat(500));
        let adapted = adapt_text(&body, &[], Platform::Telegram);
        assert!(adapted.length <= TELEGRAM_MESSAGE_LIMIT, "{}", adapted.length);
        assert!(adapted.text.ends_with("bbb</b>..."));
        assert_eq!(adapted.text.matches("<b>").count(), adapted.text.matches("</b>").count());
    }

    #[rstest]
    #[case("ab &amp; cd", 8, "ab...")]
    #[case("<b>bold</b> tail", 14, "<b>bold</b>...")]
    #[case("<a href=\"https://x.org\">link text</a>", 32, "<a href=\"https://x.org\">l</a>...")]
    #[case("x<b><i>yyyyyyyyyy</i></b>", 20, "x<b><i>yy</i></b>...")]
    #[case("<pre>code</pre> and more", 9, "...")]
    #[case("short", 10, "short")]
    fn html_cut_never_splits_markup(#[case] html: &str, #[case] limit: usize, #[case] expected: &str) {
        let cut = truncate_html(html, limit);
        assert_eq!(cut, expected);
        assert!(cut.chars().count() <= limit);
    }

    #[test]
    fn telegram_hashtags_are_escaped() {
        let tags = vec!["R&D".to_string()];
        assert_eq!(adapt_text("<p>hi</p>", &tags, Platform::Telegram).text, "hi\n\n#R&amp;D");
        assert_eq!(adapt_text("<p>hi</p>", &tags, Platform::Vk).text, "hi\n\n#R&D");
    }

    #[test]
    fn telegram_escapes_plain_text() {
        assert_eq!(adapt_text("a < b & c", &[], Platform::Telegram).text, "a &lt; b &amp; c");
    }

    #[test]
    fn strip_markup_restores_plain_text() {
        let html = "<b>a &amp; b</b>\n<a href=\"https://x.org\">c</a> &lt;3";
        assert_eq!(strip_markup(html), "a & b\nc <3");
    }

    #[test]
    fn pre_keeps_whitespace() {
        let text = render("<pre>let x = 1;\n  x</pre>", Dialect::TelegramHtml);
        assert_eq!(text, "<pre>let x = 1;\n  x</pre>");
    }
}
