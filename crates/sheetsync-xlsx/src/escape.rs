//! Excel's `_xHHHH_` string escapes and XML text escaping

/// Parse the `HHHH` of an `_xHHHH_` sequence at the start of `s`
fn escape_at(s: &str) -> Option<char> {
    let body = s.strip_prefix("_x")?;
    let hex = body.get(..4)?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) || body.as_bytes().get(4) != Some(&b'_') {
        return None;
    }
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

/// Decode `_x000D_`-style sequences written by Excel
pub(crate) fn decode_excel_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find("_x") {
        out.push_str(&rest[..pos]);
        match escape_at(&rest[pos..]) {
            Some(c) => {
                out.push(c);
                rest = &rest[pos + 7..];
            }
            None => {
                out.push('_');
                rest = &rest[pos + 1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Encode control characters, and underscores that would read back as an escape
pub(crate) fn encode_excel_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, c) in s.char_indices() {
        match c {
            '_' if escape_at(&s[i..]).is_some() => out.push_str("_x005F_"),
            '\t' | '\n' => out.push(c),
            c if (c as u32) < 0x20 => out.push_str(&format!("_x{:04X}_", c as u32)),
            c => out.push(c),
        }
    }
    out
}

pub(crate) fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
