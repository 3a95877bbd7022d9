#![forbid(unsafe_code)]

//! Entity escaping for C14N output.
//!
//! - Text nodes: `&` → `&amp;`, `<` → `&lt;`, `>` → `&gt;`, `\r` → `&#xD;`
//! - Attribute values: `&`, `<`, `"`, `\t`, `\n`, `\r`
//! - PI data: `\r` → `&#xD;`

/// Append text node content, escaped, to `out`.
pub fn text_into(out: &mut Vec<u8>, s: &str) {
    let mut last = 0;
    for (i, b) in s.bytes().enumerate() {
        let rep: &[u8] = match b {
            b'&' => b"&amp;",
            b'<' => b"&lt;",
            b'>' => b"&gt;",
            b'\r' => b"&#xD;",
            _ => continue,
        };
        out.extend_from_slice(&s.as_bytes()[last..i]);
        out.extend_from_slice(rep);
        last = i + 1;
    }
    out.extend_from_slice(&s.as_bytes()[last..]);
}

/// Append an attribute value, escaped, to `out`.
pub fn attr_into(out: &mut Vec<u8>, s: &str) {
    let mut last = 0;
    for (i, b) in s.bytes().enumerate() {
        let rep: &[u8] = match b {
            b'&' => b"&amp;",
            b'<' => b"&lt;",
            b'"' => b"&quot;",
            b'\t' => b"&#x9;",
            b'\n' => b"&#xA;",
            b'\r' => b"&#xD;",
            _ => continue,
        };
        out.extend_from_slice(&s.as_bytes()[last..i]);
        out.extend_from_slice(rep);
        last = i + 1;
    }
    out.extend_from_slice(&s.as_bytes()[last..]);
}

/// Append processing instruction data to `out`.
pub fn pi_into(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.replace('\r', "&#xD;").as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> String {
        let mut v = Vec::new();
        text_into(&mut v, s);
        String::from_utf8(v).unwrap()
    }

    fn attr(s: &str) -> String {
        let mut v = Vec::new();
        attr_into(&mut v, s);
        String::from_utf8(v).unwrap()
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(text("hello"), "hello");
        assert_eq!(text("a&b<c>d"), "a&amp;b&lt;c&gt;d");
        assert_eq!(text("line\rend"), "line&#xD;end");
        assert_eq!(text("ñandú \"x\""), "ñandú \"x\"");
    }

    #[test]
    fn test_escape_attr() {
        assert_eq!(attr("a&b\"c>"), "a&amp;b&quot;c>");
        assert_eq!(attr("a\tb\nc\rd"), "a&#x9;b&#xA;c&#xD;d");
    }
}
