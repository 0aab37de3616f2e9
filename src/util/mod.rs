//! Stateless helpers shared by the feed pipeline.
//!
//! - **URL validation**: fail-fast checks before any network I/O
//! - **Dates**: normalization of heterogeneous feed date strings
//! - **Text processing**: attribute recovery from raw markup, trimming, sanitizing
//!
//! # Examples
//!
//! ```
//! use rss_feed::util::{extract_attribute, parse_date, trim};
//!
//! let src = extract_attribute(r#"<img src="/a.png">"#, "src");
//! assert_eq!(src, "/a.png");
//!
//! assert!(parse_date("Mon, 02 Jan 2006 15:04:05 GMT").is_some());
//! assert_eq!(trim("A rather long title", 10), "A rathe...");
//! ```

mod dates;
mod text;
mod url_validator;

pub use dates::{parse_date, DateLayout, LAYOUTS};
pub use text::{clean_text, extract_attribute, strip_control_chars, trim};
pub use url_validator::{validate_url, UrlPolicy, UrlValidationError};
