//! Parameter Paths
//!
//! A path names a parameter by the names of its ancestors, root group first:
//! `synth/filter/cutoff`. A separator or escape byte inside a name is
//! preceded by the escape byte, so `a/b` as a single name encodes as `a\/b`.
//!
//! Matching works on the encoded text directly; nothing is unescaped into a
//! temporary buffer, which keeps path resolution usable on the producer thread.

/// Byte separating path components
pub const PATH_SEPARATOR: u8 = b'/';

/// Byte escaping a literal separator or escape inside a component
pub const PATH_ESCAPE: u8 = b'\\';

/// Encode name components into a path
pub fn encode_path<'a, I>(components: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut path = String::new();
    for (index, component) in components.into_iter().enumerate() {
        if index > 0 {
            path.push(PATH_SEPARATOR as char);
        }
        for ch in component.chars() {
            if ch == PATH_SEPARATOR as char || ch == PATH_ESCAPE as char {
                path.push(PATH_ESCAPE as char);
            }
            path.push(ch);
        }
    }
    path
}

/// Decode a path into owned name components
pub fn decode_path(path: &str) -> Vec<String> {
    Components::new(path)
        .map(|component| component.to_unescaped())
        .collect()
}

/// Iterator over the still-escaped components of an encoded path
#[derive(Debug, Clone)]
pub(crate) struct Components<'a> {
    rest: Option<&'a str>,
}

impl<'a> Components<'a> {
    pub(crate) fn new(path: &'a str) -> Self {
        Self { rest: Some(path) }
    }
}

impl<'a> Iterator for Components<'a> {
    type Item = Component<'a>;

    fn next(&mut self) -> Option<Component<'a>> {
        let rest = self.rest?;
        let bytes = rest.as_bytes();
        let mut index = 0;
        while index < bytes.len() {
            match bytes[index] {
                PATH_ESCAPE => index += 2,
                PATH_SEPARATOR => {
                    // Rust pattern: slicing at an ASCII byte is always a char boundary
                    self.rest = Some(&rest[index + 1..]);
                    return Some(Component(&rest[..index]));
                }
                _ => index += 1,
            }
        }
        self.rest = None;
        Some(Component(rest))
    }
}

/// One encoded component
#[derive(Debug, Clone, Copy)]
pub(crate) struct Component<'a>(&'a str);

impl<'a> Component<'a> {
    /// Unescaped bytes; a trailing lone escape stands for itself
    fn bytes(&self) -> impl Iterator<Item = u8> + 'a {
        let mut raw = self.0.bytes();
        std::iter::from_fn(move || {
            let byte = raw.next()?;
            if byte == PATH_ESCAPE {
                Some(raw.next().unwrap_or(PATH_ESCAPE))
            } else {
                Some(byte)
            }
        })
    }

    /// Compare against a plain node name without allocating
    pub(crate) fn matches(&self, name: &str) -> bool {
        self.bytes().eq(name.bytes())
    }

    pub(crate) fn to_unescaped(self) -> String {
        let bytes: Vec<u8> = self.bytes().collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
