use super::Attributes;

/// Elements serialized without a closing tag.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// A detached, owned piece of content.
///
/// Fragments are how content enters the engine (document construction,
/// `set_content`) and how it leaves it (extraction). They carry no identity;
/// building one into a [`super::Document`] allocates fresh nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    Element {
        tag: String,
        attrs: Attributes,
        children: Vec<Fragment>,
    },
}

impl Fragment {
    pub fn text(text: impl Into<String>) -> Self {
        Fragment::Text(text.into())
    }

    pub fn element(tag: &str) -> Self {
        Fragment::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: Attributes::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        if let Fragment::Element { attrs, .. } = &mut self {
            attrs.insert(name.to_string(), value.to_string());
        }
        self
    }

    pub fn with_child(self, child: Fragment) -> Self {
        self.with_children([child])
    }

    pub fn with_children(mut self, new_children: impl IntoIterator<Item = Fragment>) -> Self {
        if let Fragment::Element { children, .. } = &mut self {
            children.extend(new_children);
        }
        self
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Fragment::Element { tag, .. } => Some(tag),
            Fragment::Text(_) => None,
        }
    }

    pub fn children(&self) -> &[Fragment] {
        match self {
            Fragment::Element { children, .. } => children,
            Fragment::Text(_) => &[],
        }
    }

    /// Concatenated text of the fragment.
    pub fn text_content(&self) -> String {
        match self {
            Fragment::Text(text) => text.clone(),
            Fragment::Element { children, .. } => {
                children.iter().map(Fragment::text_content).collect()
            }
        }
    }

    /// Minimal markup serialization with escaped text and attribute values.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    fn write_markup(&self, out: &mut String) {
        match self {
            Fragment::Text(text) => {
                html_escape::encode_text_to_string(text, out);
            }
            Fragment::Element {
                tag,
                attrs,
                children,
            } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    html_escape::encode_double_quoted_attribute_to_string(value, out);
                    out.push('"');
                }
                out.push('>');
                if children.is_empty() && VOID_TAGS.contains(&tag.as_str()) {
                    return;
                }
                for child in children {
                    child.write_markup(out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

/// Serialize a list of sibling fragments.
pub fn to_markup(fragments: &[Fragment]) -> String {
    fragments.iter().map(Fragment::to_markup).collect()
}
