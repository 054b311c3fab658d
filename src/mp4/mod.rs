pub mod r#box;
pub use r#box::{find_tag, parse_box_header, BoxHeader, BoxSize};
pub mod locator; // mdat discovery: box walk, then tag scan
pub use locator::{locate_mdat, scan_for_mdat, walk_boxes, Discovery, MdatRegion, WalkOutcome};
pub mod avcc;
pub use avcc::{find_avcc_payload, AvccConfig};
