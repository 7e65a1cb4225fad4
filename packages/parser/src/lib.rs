pub mod error;
pub mod header;
pub mod scan;
pub mod value;

pub use error::{ParseError, ParseResult};
pub use header::{format_designation, parse_format, read_format, read_version};
pub use scan::{
    check_token, find_beginning_of, find_beginning_of_inset, find_beginning_of_layout,
    find_end_of, find_end_of_inset, find_end_of_layout, find_end_of_tabular, find_nonempty_line,
    find_re, find_token, find_token_backwards, find_token_exact, find_tokens,
    find_tokens_backwards, find_tokens_exact, get_containing_inset, get_containing_layout,
    is_nonempty_line, Block,
};
pub use value::{
    del_all_tokens, del_token, get_option, get_quoted_value, get_value, get_value_string,
    remove_option, set_option, strip_quotes,
};
