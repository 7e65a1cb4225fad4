//! Text encodings of LyX files.
//!
//! Files up to format 248 were written in an 8-bit or CJK encoding chosen by
//! the document language or by an explicit `\inputencoding`; later formats
//! are always UTF-8. Encoding names are the ones LyX writes into headers.
//! They resolve to `encoding_rs` encodings where one exists, to `oem_cp`
//! tables for the DOS code pages and to a fixed table for the two 8-bit sets
//! neither implements.

use crate::error::ConvertError;
use crate::result::ConvertResult;
use crate::tables;
use encoding_rs::Encoding;
use oem_cp::code_table::{DECODING_TABLE_CP_MAP, ENCODING_TABLE_CP_MAP};
use std::borrow::Cow;

/// First format whose files are always UTF-8.
pub const FIRST_UTF8_FORMAT: u32 = 249;

/// Default encoding of a document language, as used by `\inputencoding auto`.
pub fn language_encoding(language: &str) -> &'static str {
    match language {
        "afrikaans" | "american" | "australian" | "brazil" | "brazilian" | "canadian"
        | "catalan" | "danish" | "dutch" | "english" | "faroese" | "galician" | "icelandic"
        | "irish" | "italian" | "newzealand" | "norsk" | "nynorsk" | "portuges"
        | "portuguese" | "scottish" | "spanish" | "swedish" | "ukenglish" | "usenglish"
        | "welsh" | "german" | "ngerman" | "austrian" | "naustrian" => "latin1",
        "basque" | "estonian" | "finnish" | "french" | "frenchb" | "francais"
        | "canadien" | "acadian" => "latin9",
        "albanian" | "croatian" | "czech" | "hungarian" | "magyar" | "polish"
        | "romanian" | "serbian" | "slovak" | "slovene" | "sorbian" => "latin2",
        "esperanto" | "maltese" => "latin3",
        "lithuanian" | "latvian" => "latin7",
        "turkish" => "latin5",
        "greek" | "polutonikogreek" => "iso8859-7",
        "russian" => "koi8-r",
        "ukrainian" => "koi8-u",
        "bulgarian" | "belarusian" | "serbocroatian" => "cp1251",
        "hebrew" => "cp1255",
        "arabic" | "arabic_arabi" | "arabic_arabtex" | "farsi" => "cp1256",
        "thai" => "tis620-0",
        "japanese" => "euc-jp",
        "korean" => "euc-kr",
        "chinese-simplified" => "euc-cn",
        "chinese-traditional" => "big5",
        _ => "latin1",
    }
}

/// Effective encoding of a file of `format` declaring `language` and
/// `inputencoding`.
pub fn resolve_encoding(
    language: &str,
    inputencoding: &str,
    format: u32,
    cjk_encoding: Option<&str>,
) -> String {
    if format >= FIRST_UTF8_FORMAT {
        return "utf8".to_string();
    }
    if let Some(cjk) = cjk_encoding.filter(|e| !e.is_empty() && *e != "auto") {
        return cjk.to_string();
    }
    match inputencoding {
        "auto" | "default" => language_encoding(language).to_string(),
        "" => "latin1".to_string(),
        "utf8x" | "utf8-plain" | "utf8-cjk" => "utf8".to_string(),
        "latin9" => "iso-8859-15".to_string(),
        other => other.to_string(),
    }
}

/// A resolved text encoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextEncoding {
    Standard(&'static Encoding),
    /// DOS code page by number.
    CodePage(u16),
    /// ASCII plus an upper half, named as LyX names it.
    Table(&'static str, &'static [char; 128]),
}

impl TextEncoding {
    pub fn name(&self) -> Cow<'static, str> {
        match self {
            TextEncoding::Standard(encoding) => Cow::Borrowed(encoding.name()),
            TextEncoding::CodePage(cp) => Cow::Owned(format!("cp{}", cp)),
            TextEncoding::Table(name, _) => Cow::Borrowed(*name),
        }
    }

    fn decode_checked(&self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Standard(encoding) => encoding
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(Cow::into_owned),
            TextEncoding::CodePage(cp) => {
                DECODING_TABLE_CP_MAP.get(cp)?.decode_string_checked(bytes)
            }
            TextEncoding::Table(_, high) => Some(
                bytes
                    .iter()
                    .map(|&b| if b < 0x80 { char::from(b) } else { high[usize::from(b - 0x80)] })
                    .collect(),
            ),
        }
    }

    /// Decode, substituting whatever cannot be decoded.
    pub fn decode_lossy(&self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Standard(encoding) => encoding.decode(bytes).0.into_owned(),
            TextEncoding::CodePage(cp) => match DECODING_TABLE_CP_MAP.get(cp) {
                Some(table) => table.decode_string_lossy(bytes),
                None => String::from_utf8_lossy(bytes).into_owned(),
            },
            TextEncoding::Table(..) => self.decode_checked(bytes).unwrap_or_default(),
        }
    }

    /// Byte of `ch` in a single-byte encoding other than the standard ones.
    fn encode_char(&self, ch: char) -> Option<u8> {
        if ch.is_ascii() {
            return u8::try_from(ch).ok();
        }
        match self {
            TextEncoding::Standard(_) => None,
            TextEncoding::CodePage(cp) => ENCODING_TABLE_CP_MAP
                .get(cp)
                .and_then(|table| table.get(&ch))
                .copied(),
            TextEncoding::Table(_, high) => high
                .iter()
                .position(|&c| c == ch)
                .and_then(|i| u8::try_from(i + 0x80).ok()),
        }
    }
}

/// Map a LyX encoding name onto a [`TextEncoding`].
pub fn lookup_encoding(name: &str) -> ConvertResult<TextEncoding> {
    let label = match name {
        "latin10" => return Ok(TextEncoding::Table("latin10", &tables::LATIN10)),
        "pt154" | "pt254" => return Ok(TextEncoding::Table("pt254", &tables::PT154)),
        "cp437de" => return Ok(TextEncoding::CodePage(437)),
        "utf8" | "utf8x" | "utf8-plain" | "utf8-cjk" => "utf-8",
        "latin9" => "iso-8859-15",
        "latin7" => "iso-8859-13",
        "8859-6" => "iso-8859-6",
        "8859-8" => "iso-8859-8",
        "ascii" => "windows-1252",
        "tis620-0" => "tis-620",
        "euc-cn" | "gb2312" | "gbk" => "gbk",
        "applemac" => "macintosh",
        other => other,
    };
    if let Some(encoding) = Encoding::for_label(label.as_bytes()) {
        return Ok(TextEncoding::Standard(encoding));
    }
    name.strip_prefix("cp")
        .or_else(|| name.strip_prefix("ibm"))
        .and_then(|number| number.parse::<u16>().ok())
        .filter(|cp| DECODING_TABLE_CP_MAP.get(cp).is_some())
        .map(TextEncoding::CodePage)
        .ok_or_else(|| ConvertError::UnknownEncoding(name.to_string()))
}

/// Decode one line, failing on malformed input instead of substituting.
pub fn decode_line(bytes: &[u8], encoding: TextEncoding, line: usize) -> ConvertResult<String> {
    encoding.decode_checked(bytes).ok_or_else(|| ConvertError::Decode {
        encoding: encoding.name().into_owned(),
        line,
    })
}

/// Encode text; the flag is set when some characters had no representation.
/// Those are written as numeric character references.
pub fn encode_text(text: &str, encoding: TextEncoding) -> (Vec<u8>, bool) {
    if let TextEncoding::Standard(encoding) = encoding {
        let (bytes, _, had_unmappable) = encoding.encode(text);
        return (bytes.into_owned(), had_unmappable);
    }
    let mut bytes = Vec::with_capacity(text.len());
    let mut had_unmappable = false;
    for ch in text.chars() {
        match encoding.encode_char(ch) {
            Some(byte) => bytes.push(byte),
            None => {
                had_unmappable = true;
                bytes.extend_from_slice(format!("&#{};", u32::from(ch)).as_bytes());
            }
        }
    }
    (bytes, had_unmappable)
}

/// True when `ch` survives a round trip through `encoding`.
pub fn is_encodable(ch: char, encoding: TextEncoding) -> bool {
    match encoding {
        TextEncoding::Standard(encoding) => {
            let mut buffer = [0u8; 4];
            let (_, _, had_unmappable) = encoding.encode(ch.encode_utf8(&mut buffer));
            !had_unmappable
        }
        other => other.encode_char(ch).is_some(),
    }
}
