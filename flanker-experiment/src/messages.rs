//! Instruction text files shown between session stages.
//!
//! Lines starting with `#` are comments. A line starting with
//! `<--insert-->` is replaced by dynamically generated text, or dropped when
//! there is nothing to insert.

use crate::error::MessageError;
use std::path::Path;

const COMMENT: char = '#';
const INSERT_MARKER: &str = "<--insert-->";

pub fn read_message(path: &Path, insert: &str) -> Result<String, MessageError> {
    let content = std::fs::read_to_string(path).map_err(|source| MessageError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(render_message(&content, insert))
}

pub fn render_message(content: &str, insert: &str) -> String {
    let mut msg = String::with_capacity(content.len() + insert.len());
    for line in content.split_inclusive('\n') {
        if line.starts_with(COMMENT) {
            continue;
        }
        if line.starts_with(INSERT_MARKER) {
            msg.push_str(insert);
        } else {
            msg.push_str(line);
        }
    }
    msg
}
