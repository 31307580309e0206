use core::fmt::{self, Display, Formatter, Write};

/// The bytes of a NUL-terminated buffer, without the terminator.
pub fn from_cstr(buf: &[u8]) -> &[u8] {
    // We have to find the first '\0' ourselves, because the passed buffer might
    // be wider than the ASCIIZ string it contains
    let len = buf.iter().position(|e| *e == 0).unwrap_or(buf.len());

    &buf[..len]
}

/// Like [`from_cstr`], stopping early at the first byte which is not UTF-8.
pub fn to_str(buf: &[u8]) -> &str {
    let bytes = from_cstr(buf);

    match core::str::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default(),
    }
}

/// Does `haystack` contain `needle` anywhere.
pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

/// Displays raw bytes with every non-printable char replaced by `*`.
pub struct Printable<'a>(pub &'a [u8]);

impl Display for Printable<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for c in self.0 {
            let c = if (32..127).contains(c) {
                char::from(*c)
            } else {
                '*'
            };

            f.write_char(c)?;
        }

        Ok(())
    }
}
