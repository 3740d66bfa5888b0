//! Post text composition under a fixed character budget.
//!
//! A post is `title`, an optional snippet and a tail, separated by blank lines.
//! The tail is either the destination link or a set of hashtags, never both.
//!
//! When the full layout does not fit, composition degrades in order:
//!
//! 1. **Full**: title, snippet, tail
//! 2. **Title and tail**: snippet dropped
//! 3. **Truncated title**: title cut with an ellipsis, tail kept intact
//!
//! The final string is always re-measured; anything still over budget is hard
//! truncated. Composition never fails.

use crate::config::PostStyle;
use crate::models::{Article, ComposedPost, CompositionLevel};
use crate::utils::{ELLIPSIS, char_len, collapse_whitespace, truncate_with_ellipsis};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

const SEPARATOR: &str = "\n\n";
const SEPARATOR_LEN: usize = 2;

/// Share of the free space the sentence-based snippet may fill.
const SNIPPET_FILL: f64 = 0.85;
/// Below this much free space a snippet is not worth including.
const MIN_SNIPPET_CHARS: usize = 20;
const MAX_SNIPPET_SENTENCES: usize = 2;
const MAX_SNIPPET_WORDS: usize = 50;
pub const MAX_HASHTAGS: usize = 4;

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:https?://|www\.)\S+").expect("url regex"));
static CITATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[(?:\d+|[a-z]|citation needed|\+\d+ chars)\]").expect("citation regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("tag regex"));

/// Keyword rules used to infer hashtags, checked in order.
static TOPIC_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"ai|artificial intelligence|machine learning|chatgpt|openai|llms?", "#AI"),
        (r"bitcoin|ethereum|crypto(?:currency)?|blockchain", "#Crypto"),
        (r"cyber\w*|hack(?:er|ers|ed)?|ransomware|data breach", "#CyberSecurity"),
        (r"nasa|spacex|rocket|satellites?|astronauts?", "#Space"),
        (r"climate|emissions|renewable|wildfires?", "#Climate"),
        (r"elections?|congress|senate|parliament", "#Politics"),
        (r"inflation|recession|interest rates?|stock market", "#Economy"),
        (r"vaccines?|pandemic|outbreak|public health", "#Health"),
        (r"startups?|funding round|venture capital|ipo", "#Startups"),
        (r"apple|google|microsoft|amazon|nvidia|meta", "#BigTech"),
    ]
    .into_iter()
    .map(|(words, tag)| {
        let re = Regex::new(&format!(r"(?i)\b(?:{words})\b")).expect("topic rule regex");
        (re, tag)
    })
    .collect()
});

/// The closing part of a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostTail {
    Link(String),
    Hashtags(Vec<String>),
}

impl PostTail {
    /// Build the tail for `article` in the given style.
    pub fn for_article(style: PostStyle, article: &Article, link: &str) -> Self {
        match style {
            PostStyle::Link => PostTail::Link(link.trim().to_string()),
            PostStyle::Hashtags => PostTail::Hashtags(infer_hashtags(article)),
        }
    }

    pub fn render(&self) -> String {
        match self {
            PostTail::Link(link) => link.clone(),
            PostTail::Hashtags(tags) => tags.join(" "),
        }
    }
}

/// Infer up to [`MAX_HASHTAGS`] tags: the category first, then keyword rules
/// over the title and content.
pub fn infer_hashtags(article: &Article) -> Vec<String> {
    let haystack = format!("{} {}", article.title, article.content_text().unwrap_or_default());

    let from_category = article.category.as_deref().and_then(category_hashtag);
    let from_keywords = TOPIC_RULES
        .iter()
        .filter(|(re, _)| re.is_match(&haystack))
        .map(|(_, tag)| tag.to_string());

    from_category
        .into_iter()
        .chain(from_keywords)
        .unique_by(|tag| tag.to_lowercase())
        .take(MAX_HASHTAGS)
        .collect()
}

fn category_hashtag(category: &str) -> Option<String> {
    let known = match category.trim().to_lowercase().as_str() {
        "" | "general" | "top" | "news" => return None,
        "technology" | "tech" => "#Tech",
        "business" | "finance" => "#Business",
        "science" => "#Science",
        "health" => "#Health",
        "sports" | "sport" => "#Sports",
        "politics" => "#Politics",
        "entertainment" => "#Entertainment",
        "world" => "#WorldNews",
        "crypto" | "cryptocurrency" => "#Crypto",
        _ => "",
    };
    if !known.is_empty() {
        return Some(known.to_string());
    }

    // Unknown category: CamelCase its words.
    let camel: String = category
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            chars.next().map_or(String::new(), |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect();
    (!camel.is_empty()).then(|| format!("#{camel}"))
}

/// Strip URLs, markup and citation markers, then normalise whitespace.
pub fn clean_body(body: &str) -> String {
    let text = TAG_RE.replace_all(body, " ");
    let text = URL_RE.replace_all(&text, " ");
    let text = CITATION_RE.replace_all(&text, "");
    collapse_whitespace(&text)
}

/// Split text after `.`, `!` or `?` followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        if let Some(&(next_i, next)) = chars.peek() {
            if next.is_whitespace() {
                let sentence = text[start..i + c.len_utf8()].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = next_i;
            }
        }
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

/// Pick a snippet of at most `room` characters from `body`.
///
/// Whole sentences (up to two) are preferred while they stay within
/// [`SNIPPET_FILL`] of the room. If not even the first sentence fits, falls
/// back to whole words, capped at [`MAX_SNIPPET_WORDS`], with an ellipsis.
pub fn extract_snippet(body: &str, room: usize) -> Option<String> {
    let cleaned = clean_body(body);
    if cleaned.is_empty() || room == 0 {
        return None;
    }
    if char_len(&cleaned) <= room {
        return Some(cleaned);
    }

    let target = (room as f64 * SNIPPET_FILL) as usize;
    let mut snippet = String::new();
    for sentence in split_sentences(&cleaned).into_iter().take(MAX_SNIPPET_SENTENCES) {
        let sep = usize::from(!snippet.is_empty());
        if char_len(&snippet) + sep + char_len(sentence) > target {
            break;
        }
        if sep == 1 {
            snippet.push(' ');
        }
        snippet.push_str(sentence);
    }
    if !snippet.is_empty() {
        return Some(snippet);
    }

    Some(word_snippet(&cleaned, room))
}

fn word_snippet(text: &str, room: usize) -> String {
    let mut snippet = String::new();
    let mut len = 0;
    for word in text.split_whitespace().take(MAX_SNIPPET_WORDS) {
        let sep = usize::from(!snippet.is_empty());
        // Keep one char free for the ellipsis.
        if len + sep + char_len(word) + 1 > room {
            break;
        }
        if sep == 1 {
            snippet.push(' ');
        }
        snippet.push_str(word);
        len += sep + char_len(word);
    }

    if snippet.is_empty() {
        return truncate_with_ellipsis(text, room);
    }
    snippet = snippet
        .trim_end_matches(|c: char| matches!(c, ',' | ';' | ':' | '-'))
        .to_string();
    snippet.push(ELLIPSIS);
    snippet
}

fn join_parts(parts: &[&str]) -> String {
    parts.iter().filter(|p| !p.is_empty()).join(SEPARATOR)
}

/// Builds budget-conforming post text.
#[derive(Debug, Clone, Copy)]
pub struct Composer {
    budget: usize,
}

impl Composer {
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Compose the post for `article`.
    ///
    /// # Panics
    ///
    /// Panics if the article has no title. Untitled articles never pass
    /// candidate filtering, so reaching this is a caller bug.
    pub fn compose(&self, article: &Article, tail: &PostTail) -> ComposedPost {
        assert!(
            !article.title.trim().is_empty(),
            "compose called with an untitled article"
        );

        let title = collapse_whitespace(&article.title);
        let tail = tail.render();
        let tail_space = if tail.is_empty() { 0 } else { char_len(&tail) + SEPARATOR_LEN };

        if let Some(body) = article.content_text() {
            let reserved = char_len(&title) + tail_space + SEPARATOR_LEN;
            let room = self.budget.saturating_sub(reserved);
            if room >= MIN_SNIPPET_CHARS {
                if let Some(snippet) = extract_snippet(body, room) {
                    let text = join_parts(&[&title, &snippet, &tail]);
                    if char_len(&text) <= self.budget {
                        return self.finish(text, CompositionLevel::Full);
                    }
                }
            }
        }

        let text = join_parts(&[&title, &tail]);
        if char_len(&text) <= self.budget {
            return self.finish(text, CompositionLevel::TitleAndTail);
        }

        let title_room = self.budget.saturating_sub(tail_space);
        if title_room >= 2 {
            let short_title = truncate_with_ellipsis(&title, title_room);
            let text = join_parts(&[&short_title, &tail]);
            return self.finish(text, CompositionLevel::TruncatedTitle);
        }

        self.finish(text, CompositionLevel::HardTruncated)
    }

    /// Re-measure and hard-truncate anything still over budget.
    fn finish(&self, text: String, level: CompositionLevel) -> ComposedPost {
        let len = char_len(&text);
        if len <= self.budget {
            debug!(len, ?level, "Composed post");
            return ComposedPost { text, level };
        }
        debug!(len, budget = self.budget, "Composition over budget; hard truncating");
        ComposedPost {
            text: truncate_with_ellipsis(&text, self.budget),
            level: CompositionLevel::HardTruncated,
        }
    }
}

impl Default for Composer {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_CHAR_BUDGET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINK: &str = "https://t.co/abcdefghij"; // 23 chars

    fn article(title: &str, body: Option<&str>) -> Article {
        let mut a = Article::new(title, "https://news.example.com/story");
        a.body = body.map(str::to_string);
        a
    }

    fn link_tail() -> PostTail {
        PostTail::Link(LINK.to_string())
    }

    #[test]
    fn test_short_article_uses_full_layout() {
        let post = Composer::default().compose(
            &article("Quiet day on the markets", Some("Stocks were flat. Traders waited.")),
            &link_tail(),
        );
        assert_eq!(
            post.text,
            format!("Quiet day on the markets\n\nStocks were flat. Traders waited.\n\n{LINK}")
        );
        assert_eq!(post.level, CompositionLevel::Full);
    }

    #[test]
    fn test_long_body_snippet_is_truncated_with_ellipsis() {
        let title = "Regional grid operators brace for summer"; // 40 chars
        assert_eq!(char_len(title), 40);
        let body = "renewable ".repeat(400); // 4000 chars, no sentence boundary
        assert_eq!(char_len(&body), 4000);

        let post = Composer::default().compose(&article(title, Some(&body)), &link_tail());
        let parts: Vec<&str> = post.text.split("\n\n").collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], title);
        assert!(parts[1].ends_with(ELLIPSIS));
        assert!(parts[1].starts_with("renewable renewable"));
        assert_eq!(parts[2], LINK);
        let len = post.char_len();
        assert!((260..=280).contains(&len), "length {len}");
    }

    #[test]
    fn test_sentences_preferred_over_word_cut() {
        let body = format!(
            "The council approved the budget on Tuesday. Critics called it rushed. {}",
            "More detail follows here. ".repeat(40)
        );
        let post = Composer::default().compose(&article("Budget passes", Some(&body)), &link_tail());
        assert_eq!(
            post.text,
            format!(
                "Budget passes\n\nThe council approved the budget on Tuesday. Critics called it rushed.\n\n{LINK}"
            )
        );
    }

    #[test]
    fn test_snippet_strips_urls_and_citations() {
        let body = "Officials confirmed the figures[1] at https://gov.example.com/report today. See www.example.org/more [+2048 chars]";
        assert_eq!(
            clean_body(body),
            "Officials confirmed the figures at today. See"
        );
    }

    #[test]
    fn test_long_title_drops_snippet() {
        let title = "t".repeat(240);
        let post = Composer::default().compose(&article(&title, Some("Some body text here.")), &link_tail());
        assert_eq!(post.text, format!("{title}\n\n{LINK}"));
        assert_eq!(post.level, CompositionLevel::TitleAndTail);
    }

    #[test]
    fn test_adversarial_titles_truncate_title_keep_tail() {
        let composer = Composer::default();
        for len in [256, 257, 281, 500, 2000, 10_000] {
            let title = "word ".repeat(len / 5 + 1);
            let post = composer.compose(&article(&title, Some("body")), &link_tail());

            assert!(post.char_len() <= 280, "len {len} -> {}", post.char_len());
            assert!(post.text.ends_with(&format!("{ELLIPSIS}\n\n{LINK}")));
            assert_eq!(post.level, CompositionLevel::TruncatedTitle);
        }
    }

    #[test]
    fn test_budget_holds_for_all_shapes() {
        let composer = Composer::default();
        let long_body = "x".repeat(5000);
        let long_link = format!("https://example.com/{}", "p".repeat(400));
        let bodies = [None, Some("."), Some("Short."), Some(long_body.as_str())];
        let links = ["", "https://a.co", long_link.as_str()];
        for title_len in [1, 40, 200, 279, 280, 281, 1000] {
            for body in bodies {
                for link in links {
                    let title = "T".repeat(title_len);
                    let post = composer.compose(&article(&title, body), &PostTail::Link(link.to_string()));
                    assert!(post.char_len() <= 280, "title {title_len}, link {}", link.len());
                }
            }
        }
    }

    #[test]
    fn test_compose_is_deterministic() {
        let a = article("Same input", Some(&"Sentence one. Sentence two. ".repeat(30)));
        let composer = Composer::default();
        assert_eq!(composer.compose(&a, &link_tail()), composer.compose(&a, &link_tail()));
    }

    #[test]
    #[should_panic(expected = "untitled")]
    fn test_compose_without_title_panics() {
        Composer::default().compose(&article("  ", Some("body")), &link_tail());
    }

    #[test]
    fn test_hashtag_inference() {
        let mut a = article(
            "OpenAI and Nvidia strike chip deal as bitcoin rallies",
            Some("The AI startup said the funding round closed. NASA was not involved."),
        );
        a.category = Some("technology".to_string());

        let tags = infer_hashtags(&a);
        assert_eq!(tags, vec!["#Tech", "#AI", "#Crypto", "#Space"]);
    }

    #[test]
    fn test_hashtags_deduplicated_and_unknown_category() {
        let mut a = article("New vaccine trial", Some("Public health officials welcomed it."));
        a.category = Some("health".to_string());
        assert_eq!(infer_hashtags(&a), vec!["#Health"]);

        a.category = Some("climate change".to_string());
        assert_eq!(infer_hashtags(&a), vec!["#ClimateChange", "#Health"]);

        a.category = Some("general".to_string());
        a.title = "Nothing matches".to_string();
        a.body = Some("plain words".to_string());
        assert!(infer_hashtags(&a).is_empty());
    }

    #[test]
    fn test_hashtag_tail_layout() {
        let mut a = article("Rocket launch delayed", Some("SpaceX scrubbed the launch."));
        a.category = Some("science".to_string());
        let tail = PostTail::for_article(PostStyle::Hashtags, &a, LINK);

        let post = Composer::default().compose(&a, &tail);
        assert_eq!(
            post.text,
            "Rocket launch delayed\n\nSpaceX scrubbed the launch.\n\n#Science #Space"
        );
        assert!(!post.text.contains(LINK));
    }

    #[test]
    fn test_no_tail_no_trailing_separator() {
        let post = Composer::default().compose(&article("Just a title", None), &PostTail::Hashtags(vec![]));
        assert_eq!(post.text, "Just a title");
    }

    #[test]
    fn test_word_fallback_caps_word_count() {
        let snippet = extract_snippet(&"a ".repeat(500), 250).unwrap();
        assert!(snippet.ends_with(ELLIPSIS));
        assert_eq!(snippet.trim_end_matches(ELLIPSIS).split_whitespace().count(), MAX_SNIPPET_WORDS);
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("One. Two! Three? four"),
            vec!["One.", "Two!", "Three?", "four"]
        );
        assert_eq!(split_sentences("v1.2 released"), vec!["v1.2 released"]);
    }
}
