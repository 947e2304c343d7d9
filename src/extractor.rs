use log::debug;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::account::{parse_follower_count, Profile};
use crate::error::ExtractionError;
use crate::session::{Candidate, ItemExtractor, PageSnapshot};

/// CSS selectors describing one account cell in a rendered list view.
#[derive(Debug, Clone)]
pub struct CellSelectors {
    pub cell: String,
    pub link: String,
    pub display_name: String,
    pub bio: String,
    pub badge: String,
    pub avatar: String,
}

impl Default for CellSelectors {
    fn default() -> Self {
        CellSelectors {
            cell: "[data-user-cell]".to_string(),
            link: r#"a[href^="/"]"#.to_string(),
            display_name: "[data-display-name]".to_string(),
            bio: "[data-bio]".to_string(),
            badge: r#"[aria-label*="erified"]"#.to_string(),
            avatar: "img".to_string(),
        }
    }
}

pub struct HtmlExtractor {
    cell: Selector,
    link: Selector,
    display_name: Selector,
    bio: Selector,
    badge: Selector,
    avatar: Selector,
    text: Selector,
}

impl HtmlExtractor {
    pub fn new(selectors: &CellSelectors) -> Result<Self, ExtractionError> {
        Ok(HtmlExtractor {
            cell: parse_selector(&selectors.cell)?,
            link: parse_selector(&selectors.link)?,
            display_name: parse_selector(&selectors.display_name)?,
            bio: parse_selector(&selectors.bio)?,
            badge: parse_selector(&selectors.badge)?,
            avatar: parse_selector(&selectors.avatar)?,
            text: parse_selector("span")?,
        })
    }

    fn extract_cell(&self, cell: ElementRef<'_>, base: Option<&Url>) -> Candidate {
        let href = cell
            .select(&self.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string);

        let mut profile = Profile {
            display_name: self.first_text(cell, &self.display_name),
            bio: self.first_text(cell, &self.bio),
            ..Profile::default()
        };

        // Counts render as free text, e.g. "34.2K followers".
        for span in cell.select(&self.text) {
            let text = span.text().collect::<String>();
            if text.to_lowercase().contains("follower") {
                if let Some(count) = parse_follower_count(&text) {
                    profile.followers_count = count;
                    break;
                }
            }
        }

        if let Some(label) = cell
            .select(&self.badge)
            .next()
            .and_then(|b| b.value().attr("aria-label"))
        {
            let label = label.to_lowercase();
            if label.contains("blue") || label.contains("subscribed") {
                profile.blue_verified = true;
            } else {
                profile.verified = true;
            }
        }

        if let Some(src) = cell
            .select(&self.avatar)
            .next()
            .and_then(|img| img.value().attr("src"))
        {
            profile.profile_image = src.to_string();
        }

        if let (Some(base), Some(href)) = (base, href.as_deref()) {
            if let Ok(joined) = base.join(href) {
                profile.profile_url = joined.to_string();
            }
        }

        Candidate { link: href, profile }
    }

    fn first_text(&self, cell: ElementRef<'_>, selector: &Selector) -> String {
        cell.select(selector)
            .next()
            .map(|el| el.text().collect::<Vec<_>>().join(" ").trim().to_string())
            .unwrap_or_default()
    }
}

impl ItemExtractor<PageSnapshot> for HtmlExtractor {
    fn extract(&self, page: &PageSnapshot) -> Vec<Result<Candidate, ExtractionError>> {
        let base = Url::parse(&page.url).ok();
        let mut candidates = Vec::new();
        for html in &page.documents {
            let document = Html::parse_document(html);
            for cell in document.select(&self.cell) {
                candidates.push(Ok(self.extract_cell(cell, base.as_ref())));
            }
        }
        debug!("Extracted {} candidate cells from {}", candidates.len(), page.url);
        candidates
    }
}

fn parse_selector(raw: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(raw).map_err(|_| ExtractionError::Malformed(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div data-user-cell>
            <a href="/alice"><img src="https://img.example/alice.png"></a>
            <span data-display-name>Alice A.</span>
            <div data-bio>Builds parsers</div>
            <span>34.2K followers</span>
            <svg aria-label="Verified account"></svg>
          </div>
          <div data-user-cell>
            <a href="/bob"><span data-display-name>Bob</span></a>
            <svg aria-label="Verified with blue subscription"></svg>
          </div>
          <div data-user-cell><span>no link here</span></div>
        </body></html>
    "#;

    fn snapshot() -> PageSnapshot {
        PageSnapshot {
            url: "https://social.example/carol/following".to_string(),
            documents: vec![PAGE.to_string()],
        }
    }

    #[test]
    fn extracts_every_cell() {
        let extractor = HtmlExtractor::new(&CellSelectors::default()).unwrap();
        let candidates: Vec<Candidate> = extractor
            .extract(&snapshot())
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(candidates.len(), 3);

        let alice = &candidates[0];
        assert_eq!(alice.link.as_deref(), Some("/alice"));
        assert_eq!(alice.profile.display_name, "Alice A.");
        assert_eq!(alice.profile.bio, "Builds parsers");
        assert_eq!(alice.profile.followers_count, 34_200);
        assert!(alice.profile.verified);
        assert!(!alice.profile.blue_verified);
        assert_eq!(alice.profile.profile_url, "https://social.example/alice");
        assert_eq!(alice.profile.profile_image, "https://img.example/alice.png");

        assert!(candidates[1].profile.blue_verified);
        assert_eq!(candidates[2].link, None);
    }

    #[test]
    fn bad_selector_is_an_error() {
        let selectors = CellSelectors {
            cell: "[[".to_string(),
            ..CellSelectors::default()
        };
        assert!(HtmlExtractor::new(&selectors).is_err());
    }
}
