use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lyx2lyx_common::RunConfig;
use lyx2lyx_converter::Document;
use lyx2lyx_parser::find_end_of_inset;

fn lyx_13_document(paragraphs: usize) -> String {
    let mut text = String::from(
        "#LyX 1.3 created this file. For more info see http://www.lyx.org/\n\
\\lyxformat 221\n\
\\textclass article\n\
\\language english\n\
\\inputencoding auto\n\
\\fontscheme default\n\
\\graphics default\n\
\\paperfontsize default\n\
\\use_amsmath 0\n\
\\use_natbib 0\n\
\\use_numerical_citations 0\n\
\\paperorientation portrait\n\
\n",
    );
    for n in 0..paragraphs {
        text.push_str("\\layout Standard\n\n");
        text.push_str(&format!("Paragraph {} with some text and a formula\n", n));
        text.push_str("\\begin_inset Formula $x^2$\n\\end_inset\n\n");
        text.push_str(" continues here.\n\n");
    }
    text.push_str("\\the_end\n");
    text
}

fn convert_to_newest(c: &mut Criterion) {
    let source = lyx_13_document(200);

    c.bench_function("convert_221_to_276", |b| {
        b.iter(|| {
            let mut document =
                Document::from_text(black_box(&source), RunConfig::default()).unwrap();
            document.convert().unwrap();
            document
        })
    });
}

fn revert_to_oldest_revertible(c: &mut Criterion) {
    let mut document = Document::from_text(&lyx_13_document(200), RunConfig::default()).unwrap();
    document.convert().unwrap();
    let source = document.to_text().unwrap();

    c.bench_function("revert_276_to_221", |b| {
        b.iter(|| {
            let config = RunConfig::default().to_format(221);
            let mut document = Document::from_text(black_box(&source), config).unwrap();
            document.convert().unwrap();
            document
        })
    });
}

fn scan_nested_insets(c: &mut Criterion) {
    let depth = 500;
    let mut lines = Vec::with_capacity(depth * 2);
    lines.extend((0..depth).map(|_| "\\begin_inset Note Note".to_string()));
    lines.extend((0..depth).map(|_| "\\end_inset".to_string()));

    c.bench_function("find_end_of_nested_inset", |b| {
        b.iter(|| find_end_of_inset(black_box(&lines), 0))
    });
}

criterion_group!(benches, convert_to_newest, revert_to_oldest_revertible, scan_nested_insets);
criterion_main!(benches);
