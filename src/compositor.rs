//! Assembles the isolated preview document from the three sources.
//!
//! Composition is pure string concatenation in a fixed order: style block,
//! body markup, the bridge script, then the user script. The bridge must
//! come before the user script so interception is installed first; markup
//! is inserted verbatim, so script elements inside it run ahead of the
//! bridge and are not intercepted, matching sibling-script semantics in
//! the source document.

use scraper::{Html, Selector};
use sha2::{Digest, Sha256};

use crate::bridge::BRIDGE_SCRIPT;
use crate::SourceSnapshot;

/// Textual snapshot of the composed preview: the observable rendering
/// surface of a headless host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewSnapshot {
    /// Page title, when the markup provides one
    pub title: String,
    /// Extracted body text
    pub text: String,
}

/// Build the full preview document for one source snapshot.
///
/// The output is deterministic: the same snapshot always yields the same
/// document, byte for byte.
pub fn compose_document(snapshot: &SourceSnapshot) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head><style>{style}</style></head>\n\
         <body>\n\
         {markup}\n\
         <script>\n{bridge}</script>\n\
         <script>\n{script}\n</script>\n\
         </body>\n\
         </html>\n",
        style = snapshot.style,
        markup = snapshot.markup,
        bridge = BRIDGE_SCRIPT,
        script = snapshot.script,
    )
}

/// Extract the text of every `<style>` block, in document order.
pub fn extract_styles(document: &str) -> Vec<String> {
    let doc = Html::parse_document(document);
    let sel = Selector::parse("style").unwrap();
    doc.select(&sel)
        .map(|node| node.text().collect::<String>())
        .filter(|text| !text.trim().is_empty())
        .collect()
}

/// Extract the text of every `<script>` block, in document order.
///
/// Installing a composed document means executing these sequentially in a
/// fresh sandbox; for a plain snapshot that is the bridge followed by the
/// user script.
pub fn extract_scripts(document: &str) -> Vec<String> {
    let doc = Html::parse_document(document);
    let sel = Selector::parse("script").unwrap();
    doc.select(&sel)
        .map(|node| node.text().collect::<String>())
        .filter(|text| !text.trim().is_empty())
        .collect()
}

/// Extract the title and body text of a composed document.
pub fn snapshot_document(document: &str) -> PreviewSnapshot {
    let doc = Html::parse_document(document);
    let title_sel = Selector::parse("title").unwrap();
    let body_sel = Selector::parse("body").unwrap();

    let title = doc
        .select(&title_sel)
        .next()
        .map(|n| n.text().collect::<String>())
        .unwrap_or_default();

    // Body text without the script blocks: scripts are execution payload,
    // not rendered content.
    let text = doc
        .select(&body_sel)
        .next()
        .map(|body| {
            let script_sel = Selector::parse("script").unwrap();
            let script_text: Vec<String> = doc
                .select(&script_sel)
                .map(|s| s.text().collect::<String>())
                .collect();
            let mut text = body.text().collect::<String>();
            for s in &script_text {
                text = text.replace(s.as_str(), "");
            }
            text
        })
        .unwrap_or_default();

    PreviewSnapshot { title, text }
}

/// Content digest (sha256 hex) of a composed document.
pub fn document_digest(document: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document.as_bytes());
    hex::encode(hasher.finalize())
}
