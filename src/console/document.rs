//! Console document: the element list a console front end renders.

/// Line-break markup used inside element content.
pub const LINE_BREAK: &str = "<br/>";

/// One element appended to the document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub inner_html: String,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            inner_html: String::new(),
        }
    }

    pub fn set_inner_html(&mut self, markup: impl Into<String>) {
        self.inner_html = markup.into();
    }

    pub fn outer_html(&self) -> String {
        format!("<{0}>{1}</{0}>", self.tag, self.inner_html)
    }

    /// Visual lines of the element, split on line-break markup.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.inner_html.split(LINE_BREAK)
    }
}

/// Document owned by the console's UI loop.
///
/// Only the UI loop mutates it; writers reach it through tasks dispatched
/// by the console window.
#[derive(Debug, Default, Clone)]
pub struct ConsoleDocument {
    body: Vec<Element>,
}

impl ConsoleDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_element(&self, tag: &str) -> Element {
        Element::new(tag)
    }

    pub fn append_child(&mut self, element: Element) {
        self.body.push(element);
    }

    pub fn body(&self) -> &[Element] {
        &self.body
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Serialized body, one element after another.
    pub fn document_text(&self) -> String {
        self.body.iter().map(Element::outer_html).collect()
    }

    /// Every visual line of every element, in document order.
    pub fn rendered_lines(&self) -> Vec<String> {
        self.body
            .iter()
            .flat_map(|el| el.lines().map(str::to_string))
            .collect()
    }
}
