use std::borrow::Cow;

use ego_tree::NodeRef;
use scraper::node::{Element, Node};
use scraper::{ElementRef, Html};
use thiserror::Error;

use crate::filename::{image_filename, page_filename};

pub const IMAGE_ANCHOR_CLASS: &str = "image";
pub const EDIT_SECTION_CLASS: &str = "mw-editsection";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

/// The rendered markup broke an assumption about MediaWiki's output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("<{element}> element without `{attribute}` attribute: {markup}")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
        markup: String,
    },
}

/// Rewrites one page of wiki-rendered HTML into a standalone document.
#[derive(Debug, Clone)]
pub struct PageTransformer {
    link_prefix: String,
    image_dir: String,
}

impl PageTransformer {
    /// `image_dir` is the image directory relative to the page files.
    pub fn new(link_prefix: impl Into<String>, image_dir: impl Into<String>) -> Self {
        Self {
            link_prefix: link_prefix.into(),
            image_dir: image_dir.into(),
        }
    }

    pub fn transform(&self, raw_html: &str, head: Option<&str>) -> Result<String, TransformError> {
        let fragment = Html::parse_fragment(raw_html);
        let mut out = String::with_capacity(raw_html.len() + 64);
        out.push_str("<html>");
        out.push_str(head.unwrap_or(""));
        out.push_str("<body>");
        for child in fragment.root_element().children() {
            self.render_node(child, false, &mut out)?;
        }
        out.push_str("</body></html>");
        Ok(out)
    }

    fn render_node(
        &self,
        node: NodeRef<'_, Node>,
        in_image_anchor: bool,
        out: &mut String,
    ) -> Result<(), TransformError> {
        match node.value() {
            Node::Text(text) => escape_text(text, out),
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(node) {
                    self.render_element(element, in_image_anchor, out)?;
                }
            }
            _ => {
                for child in node.children() {
                    self.render_node(child, in_image_anchor, out)?;
                }
            }
        }
        Ok(())
    }

    fn render_element(
        &self,
        element: ElementRef<'_>,
        in_image_anchor: bool,
        out: &mut String,
    ) -> Result<(), TransformError> {
        let value = element.value();
        match value.name() {
            "a" => {
                let href = value.attr("href").ok_or_else(|| missing("a", "href", element))?;
                if has_class(value, IMAGE_ANCHOR_CLASS) {
                    return self.render_children(element, true, out);
                }
                let href = self.rewrite_href(href);
                self.render_tag(element, in_image_anchor, out, |name, raw| {
                    if name == "href" { href.clone() } else { raw.to_string() }
                })
            }
            "span" if has_class(value, EDIT_SECTION_CLASS) => Ok(()),
            "img" if in_image_anchor => {
                let alt = value.attr("alt").ok_or_else(|| missing("img", "alt", element))?;
                let src = format!("{}/{}", self.image_dir, image_filename(alt));
                out.push_str("<img");
                let mut wrote_src = false;
                for (name, raw) in qualified_attrs(value) {
                    match name.as_ref() {
                        "alt" => {}
                        "src" => {
                            push_attr(out, "src", &src);
                            wrote_src = true;
                        }
                        _ => push_attr(out, &name, raw),
                    }
                }
                if !wrote_src {
                    push_attr(out, "src", &src);
                }
                out.push('>');
                Ok(())
            }
            _ => self.render_tag(element, in_image_anchor, out, |_, raw| raw.to_string()),
        }
    }

    /// Emit an element unchanged apart from its attribute values, which pass
    /// through `map_attr` keyed by their qualified name.
    fn render_tag<F>(
        &self,
        element: ElementRef<'_>,
        in_image_anchor: bool,
        out: &mut String,
        map_attr: F,
    ) -> Result<(), TransformError>
    where
        F: Fn(&str, &str) -> String,
    {
        let name = element.value().name();
        out.push('<');
        out.push_str(name);
        for (attr, raw) in qualified_attrs(element.value()) {
            push_attr(out, &attr, &map_attr(&attr, raw));
        }
        out.push('>');

        if VOID_ELEMENTS.contains(&name) {
            return Ok(());
        }
        if RAW_TEXT_ELEMENTS.contains(&name) {
            for child in element.children() {
                if let Node::Text(text) = child.value() {
                    out.push_str(text);
                }
            }
        } else {
            self.render_children(element, in_image_anchor, out)?;
        }

        out.push_str("</");
        out.push_str(name);
        out.push('>');
        Ok(())
    }

    fn render_children(
        &self,
        element: ElementRef<'_>,
        in_image_anchor: bool,
        out: &mut String,
    ) -> Result<(), TransformError> {
        for child in element.children() {
            self.render_node(child, in_image_anchor, out)?;
        }
        Ok(())
    }

    /// Prefix match only; anything else (external, protocol-relative,
    /// fragment) is returned as-is.
    fn rewrite_href(&self, href: &str) -> String {
        match href.strip_prefix(self.link_prefix.as_str()) {
            Some(target) => page_filename(target),
            None => href.to_string(),
        }
    }
}

fn has_class(element: &Element, class: &str) -> bool {
    element.classes().any(|candidate| candidate == class)
}

/// Attribute names as written in the source. Foreign attributes such as
/// `xlink:href` keep their prefix so they never collide with a plain `href`.
fn qualified_attrs(element: &Element) -> impl Iterator<Item = (Cow<'_, str>, &str)> {
    element.attrs.iter().map(|(name, value)| {
        let qualified = match name.prefix.as_deref() {
            Some(prefix) => Cow::Owned(format!("{prefix}:{}", &*name.local)),
            None => Cow::Borrowed(&*name.local),
        };
        (qualified, &**value)
    })
}

fn missing(element: &'static str, attribute: &'static str, node: ElementRef<'_>) -> TransformError {
    TransformError::MissingAttribute {
        element,
        attribute,
        markup: node.html(),
    }
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
    out.push('"');
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PageTransformer, TransformError};

    fn transformer() -> PageTransformer {
        PageTransformer::new("/wiki/", "img")
    }

    fn body(html: &str) -> String {
        let document = transformer().transform(html, None).expect("transform");
        document
            .strip_prefix("<html><body>")
            .and_then(|rest| rest.strip_suffix("</body></html>"))
            .expect("document wrapper")
            .to_string()
    }

    #[test]
    fn internal_links_point_at_local_files() {
        assert_eq!(
            body(r#"<p><a href="/wiki/Some_Page" title="Some Page">Some Page</a></p>"#),
            r#"<p><a href="Some_Page.html" title="Some Page">Some Page</a></p>"#
        );
        assert_eq!(
            body(r#"<a href="/wiki/Help:Contents/FAQ">FAQ</a>"#),
            r#"<a href="Help_Contents_FAQ.html">FAQ</a>"#
        );
    }

    #[test]
    fn external_links_are_untouched() {
        for href in [
            "https://example.org/x",
            "//example.org/wiki/Page",
            "#section",
            "/w/index.php?title=Page&action=edit",
        ] {
            let markup = format!(r#"<a href="{}">x</a>"#, href.replace('&', "&amp;"));
            assert_eq!(body(&markup), markup);
        }
    }

    #[test]
    fn image_anchor_is_unwrapped_into_local_img() {
        let output = body(
            r#"<p><a href="/wiki/File:Foo.png" class="image"><img alt="Foo.png"></a></p>"#,
        );
        assert_eq!(output, r#"<p><img src="img/Foo.png"></p>"#);
        assert!(!output.contains("<a"));
        assert!(!output.contains("alt="));
    }

    #[test]
    fn image_anchor_replaces_existing_src() {
        let output = body(
            r#"<a href="/wiki/File:Foo.png" class="image"><img alt="Foo.png" src="/images/a/ab/Foo.png"></a>"#,
        );
        assert_eq!(output, r#"<img src="img/Foo.png">"#);
    }

    #[test]
    fn edit_section_spans_disappear() {
        let output = body(
            r#"<h2><span class="mw-headline" id="History">History</span><span class="mw-editsection"><span class="mw-editsection-bracket">[</span><a href="/w/index.php?title=Main&amp;action=edit&amp;section=1" title="Edit section: History">edit</a><span class="mw-editsection-bracket">]</span></span></h2>"#,
        );
        assert_eq!(
            output,
            r#"<h2><span class="mw-headline" id="History">History</span></h2>"#
        );
    }

    #[test]
    fn svg_xlink_attributes_keep_their_prefix() {
        let output = body(
            r##"<svg><a xlink:href="#x" href="/wiki/A"><use xlink:href="#y"></use></a></svg>"##,
        );
        assert_eq!(output.matches(r#"href="A.html""#).count(), 1);
        assert!(output.contains(r##"xlink:href="#x""##));
        assert!(output.contains(r##"<use xlink:href="#y"></use>"##));
        assert!(!output.contains(r##" href="#"##));
    }

    #[test]
    fn head_block_is_inserted_verbatim() {
        let document = transformer()
            .transform("<p>Hi</p>", Some("<title>T</title>"))
            .expect("transform");
        assert_eq!(
            document,
            "<html><title>T</title><body><p>Hi</p></body></html>"
        );
    }

    #[test]
    fn text_and_comments_survive_serialization() {
        assert_eq!(
            body("<p>a &lt; b &amp; c</p><!-- NewPP limit report --><br>"),
            "<p>a &lt; b &amp; c</p><!-- NewPP limit report --><br>"
        );
    }

    #[test]
    fn anchor_without_href_is_a_contract_violation() {
        let error = transformer()
            .transform(r#"<a name="top">Top</a>"#, None)
            .expect_err("missing href");
        assert!(matches!(
            error,
            TransformError::MissingAttribute {
                element: "a",
                attribute: "href",
                ..
            }
        ));
    }

    #[test]
    fn image_without_alt_is_a_contract_violation() {
        let error = transformer()
            .transform(
                r#"<a href="/wiki/File:Foo.png" class="image"><img src="/images/Foo.png"></a>"#,
                None,
            )
            .expect_err("missing alt");
        assert!(matches!(
            error,
            TransformError::MissingAttribute {
                element: "img",
                attribute: "alt",
                ..
            }
        ));
    }
}
