use scraper::{node::Element, ElementRef, Html, Selector};

/// Blocks that carry site chrome or non-visible content.
const STRIPPED_TAGS: [&str; 8] = [
    "header", "footer", "head", "title", "script", "style", "noscript", "template",
];

/// Converts harvested markup to markdown, keeping link targets visible.
pub fn normalize(raw_html: &str) -> String {
    let cleaned = strip_chrome(raw_html);

    match htmd::convert(&cleaned) {
        Ok(markdown) => markdown,
        Err(e) => {
            log::warn!("Markdown conversion failed, keeping markup as-is: {:?}", e);
            cleaned
        }
    }
}

/// Detaches chrome and non-visible elements, with everything inside them,
/// from the parsed tree and serializes what remains.
pub fn strip_chrome(raw_html: &str) -> String {
    let mut document = Html::parse_fragment(raw_html);

    let Ok(selector) = Selector::parse(&STRIPPED_TAGS.join(", ")) else {
        return document.root_element().inner_html();
    };
    let outermost: Vec<_> = document
        .select(&selector)
        .filter(|element| !has_stripped_ancestor(element))
        .map(|element| element.id())
        .collect();

    for id in outermost {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    document.root_element().inner_html()
}

fn is_stripped(element: &Element) -> bool {
    STRIPPED_TAGS.contains(&element.name())
}

fn has_stripped_ancestor(element: &ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| is_stripped(ancestor.value()))
}
