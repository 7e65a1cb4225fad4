//! Upper halves of the 8-bit character sets LyX writes that `encoding_rs`
//! does not implement. Index 0 is byte 0x80.

/// ISO-8859-16, LyX `latin10`.
pub(crate) static LATIN10: [char; 128] = [
    '\u{0080}', '\u{0081}', '\u{0082}', '\u{0083}', '\u{0084}', '\u{0085}', '\u{0086}', '\u{0087}',
    '\u{0088}', '\u{0089}', '\u{008a}', '\u{008b}', '\u{008c}', '\u{008d}', '\u{008e}', '\u{008f}',
    '\u{0090}', '\u{0091}', '\u{0092}', '\u{0093}', '\u{0094}', '\u{0095}', '\u{0096}', '\u{0097}',
    '\u{0098}', '\u{0099}', '\u{009a}', '\u{009b}', '\u{009c}', '\u{009d}', '\u{009e}', '\u{009f}',
    '\u{00a0}', '\u{0104}', '\u{0105}', '\u{0141}', '\u{20ac}', '\u{201e}', '\u{0160}', '\u{00a7}',
    '\u{0161}', '\u{00a9}', '\u{0218}', '\u{00ab}', '\u{0179}', '\u{00ad}', '\u{017a}', '\u{017b}',
    '\u{00b0}', '\u{00b1}', '\u{010c}', '\u{0142}', '\u{017d}', '\u{201d}', '\u{00b6}', '\u{00b7}',
    '\u{017e}', '\u{010d}', '\u{0219}', '\u{00bb}', '\u{0152}', '\u{0153}', '\u{0178}', '\u{017c}',
    '\u{00c0}', '\u{00c1}', '\u{00c2}', '\u{0102}', '\u{00c4}', '\u{0106}', '\u{00c6}', '\u{00c7}',
    '\u{00c8}', '\u{00c9}', '\u{00ca}', '\u{00cb}', '\u{00cc}', '\u{00cd}', '\u{00ce}', '\u{00cf}',
    '\u{0110}', '\u{0143}', '\u{00d2}', '\u{00d3}', '\u{00d4}', '\u{0150}', '\u{00d6}', '\u{015a}',
    '\u{0170}', '\u{00d9}', '\u{00da}', '\u{00db}', '\u{00dc}', '\u{0118}', '\u{021a}', '\u{00df}',
    '\u{00e0}', '\u{00e1}', '\u{00e2}', '\u{0103}', '\u{00e4}', '\u{0107}', '\u{00e6}', '\u{00e7}',
    '\u{00e8}', '\u{00e9}', '\u{00ea}', '\u{00eb}', '\u{00ec}', '\u{00ed}', '\u{00ee}', '\u{00ef}',
    '\u{0111}', '\u{0144}', '\u{00f2}', '\u{00f3}', '\u{00f4}', '\u{0151}', '\u{00f6}', '\u{015b}',
    '\u{0171}', '\u{00f9}', '\u{00fa}', '\u{00fb}', '\u{00fc}', '\u{0119}', '\u{021b}', '\u{00ff}',
];

/// Paratype PT154, LyX `pt254`.
pub(crate) static PT154: [char; 128] = [
    '\u{0496}', '\u{0492}', '\u{04ee}', '\u{0493}', '\u{201e}', '\u{2026}', '\u{04b6}', '\u{04ae}',
    '\u{04b2}', '\u{04af}', '\u{04a0}', '\u{04e2}', '\u{04a2}', '\u{049a}', '\u{04ba}', '\u{04b8}',
    '\u{0497}', '\u{2018}', '\u{2019}', '\u{201c}', '\u{201d}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{04b3}', '\u{04b7}', '\u{04a1}', '\u{04e3}', '\u{04a3}', '\u{049b}', '\u{04bb}', '\u{04b9}',
    '\u{00a0}', '\u{040e}', '\u{045e}', '\u{0408}', '\u{04e8}', '\u{0498}', '\u{04b0}', '\u{00a7}',
    '\u{0401}', '\u{00a9}', '\u{04d8}', '\u{00ab}', '\u{00ac}', '\u{04ef}', '\u{00ae}', '\u{049c}',
    '\u{00b0}', '\u{04b1}', '\u{0406}', '\u{0456}', '\u{0499}', '\u{04e9}', '\u{00b6}', '\u{00b7}',
    '\u{0451}', '\u{2116}', '\u{04d9}', '\u{00bb}', '\u{0458}', '\u{04aa}', '\u{04ab}', '\u{049d}',
    '\u{0410}', '\u{0411}', '\u{0412}', '\u{0413}', '\u{0414}', '\u{0415}', '\u{0416}', '\u{0417}',
    '\u{0418}', '\u{0419}', '\u{041a}', '\u{041b}', '\u{041c}', '\u{041d}', '\u{041e}', '\u{041f}',
    '\u{0420}', '\u{0421}', '\u{0422}', '\u{0423}', '\u{0424}', '\u{0425}', '\u{0426}', '\u{0427}',
    '\u{0428}', '\u{0429}', '\u{042a}', '\u{042b}', '\u{042c}', '\u{042d}', '\u{042e}', '\u{042f}',
    '\u{0430}', '\u{0431}', '\u{0432}', '\u{0433}', '\u{0434}', '\u{0435}', '\u{0436}', '\u{0437}',
    '\u{0438}', '\u{0439}', '\u{043a}', '\u{043b}', '\u{043c}', '\u{043d}', '\u{043e}', '\u{043f}',
    '\u{0440}', '\u{0441}', '\u{0442}', '\u{0443}', '\u{0444}', '\u{0445}', '\u{0446}', '\u{0447}',
    '\u{0448}', '\u{0449}', '\u{044a}', '\u{044b}', '\u{044c}', '\u{044d}', '\u{044e}', '\u{044f}',
];
