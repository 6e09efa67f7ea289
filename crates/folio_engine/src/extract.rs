use scraper::{ElementRef, Html, Selector};

use crate::ImageReference;

/// Result of scanning a document for `<img>` tags.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractedImages {
    /// Number of `<img>` tags in the document, including unusable ones.
    pub total_tags: usize,
    /// Usable references in document order.
    pub references: Vec<ImageReference>,
    /// Positions of tags that carried neither `data-src` nor `src`.
    pub missing_source: Vec<usize>,
}

impl ExtractedImages {
    fn push(&mut self, element: ElementRef<'_>) {
        self.total_tags += 1;
        let order = self.total_tags;
        match image_source(element) {
            Some(raw_url) => self.references.push(ImageReference {
                order,
                raw_url: raw_url.to_string(),
            }),
            None => self.missing_source.push(order),
        }
    }
}

/// Collects every `<img>` in document order.
///
/// Lazy-loading pages put a placeholder in `src` and the real address in
/// `data-src`, so `data-src` wins when both are present. Empty attributes
/// count as absent.
///
/// The parser keeps `<noscript>` content as raw text. That text is parsed as
/// a fragment and its `<img>` tags take their place in the sequence.
pub fn extract_images(html: &str) -> ExtractedImages {
    let document = Html::parse_document(html);
    let (Ok(selector), Ok(img)) = (Selector::parse("img, noscript"), Selector::parse("img")) else {
        return ExtractedImages::default();
    };

    let mut extracted = ExtractedImages::default();
    for element in document.select(&selector) {
        if element.value().name() == "img" {
            extracted.push(element);
            continue;
        }
        // Element children are already matched by the outer selector.
        if element.children().any(|child| child.value().is_element()) {
            continue;
        }
        let text: String = element.text().collect();
        if !text.contains('<') {
            continue;
        }
        let fragment = Html::parse_fragment(&text);
        for inner in fragment.select(&img) {
            extracted.push(inner);
        }
    }
    extracted
}

fn image_source(element: ElementRef<'_>) -> Option<&str> {
    let attr = |name: &str| {
        element
            .value()
            .attr(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };
    attr("data-src").or_else(|| attr("src"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn urls(extracted: &ExtractedImages) -> Vec<(usize, &str)> {
        extracted
            .references
            .iter()
            .map(|r| (r.order, r.raw_url.as_str()))
            .collect()
    }

    #[test]
    fn data_src_wins_over_src() {
        let extracted = extract_images(
            r#"<img src="/placeholder.gif" data-src="/real.jpg"><img src=" /plain.png ">"#,
        );
        assert_eq!(urls(&extracted), vec![(1, "/real.jpg"), (2, "/plain.png")]);
    }

    #[test]
    fn tags_without_source_keep_their_position() {
        let extracted = extract_images(r#"<img><img src=""><img src="/c.png">"#);
        assert_eq!(extracted.total_tags, 3);
        assert_eq!(extracted.missing_source, vec![1, 2]);
        assert_eq!(urls(&extracted), vec![(3, "/c.png")]);
    }

    #[test]
    fn noscript_images_are_counted_in_place() {
        let extracted = extract_images(
            r#"<html><body><noscript><img src="/a.png"></noscript><img src="/b.png"></body></html>"#,
        );
        assert_eq!(extracted.total_tags, 2);
        assert_eq!(urls(&extracted), vec![(1, "/a.png"), (2, "/b.png")]);
    }

    #[test]
    fn noscript_text_without_markup_adds_nothing() {
        let extracted =
            extract_images(r#"<noscript>enable scripts</noscript><img src="/only.png">"#);
        assert_eq!(urls(&extracted), vec![(1, "/only.png")]);
    }
}
