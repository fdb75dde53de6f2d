//! Output formatting for CLI operations.

use resfork::codec::HeaderKind;
use resfork::{CompressedHeader, ResType, ResourceAttrs, ResourceFileAttrs, text};
use serde_json::json;

use crate::GroupBy;

/// Header and map summary of a resource file.
pub struct FileInfo {
    pub fork: Option<&'static str>,
    pub data_offset: u32,
    pub data_length: u32,
    pub map_offset: u32,
    pub map_length: u32,
    pub system_data: Vec<u8>,
    pub application_data: Vec<u8>,
    pub file_attributes: ResourceFileAttrs,
    pub type_list_offset: u16,
    pub name_list_offset: u16,
    pub type_count: usize,
    pub resource_count: usize,
}

/// Length of a resource as far as it could be determined.
pub enum Length {
    /// Stored without compression.
    Plain(u32),
    /// Compressed; decompressed and stored lengths.
    Compressed { length: u32, raw: u32 },
    /// Flagged compressed, but the header could not be parsed.
    BadHeader { raw: u32 },
    /// The length prefix could not be read.
    Unreadable(String),
}

/// One row of a resource listing.
pub struct ResourceRow {
    pub res_type: ResType,
    pub id: i16,
    pub name: Option<Vec<u8>>,
    pub attributes: ResourceAttrs,
    pub data_offset: u32,
    pub length: Length,
    pub crc32: Option<u32>,
}

/// Trait for output formatting
pub trait OutputFormatter {
    /// Formats resource file information
    fn format_info(&self, info: &FileInfo) -> String;

    /// Formats a list of resources
    fn format_list(&self, rows: &[ResourceRow], group: GroupBy, technical: bool) -> String;

    /// Formats a compressed resource header
    fn format_compress_info(&self, header: &CompressedHeader) -> String;
}

/// Human-readable output formatter
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn format_info(&self, info: &FileInfo) -> String {
        let mut output = String::new();

        if let Some(fork) = info.fork {
            output.push_str(&format!("Read from the {fork} fork\n\n"));
        }
        output.push_str("System-reserved header data:\n");
        for line in hexdump(&info.system_data) {
            output.push_str(&line);
            output.push('\n');
        }
        output.push('\n');
        output.push_str("Application-specific header data:\n");
        for line in hexdump(&info.application_data) {
            output.push_str(&line);
            output.push('\n');
        }
        output.push('\n');

        output.push_str(&format!(
            "Resource data starts at {:#x} and is {:#x} bytes long\n",
            info.data_offset, info.data_length
        ));
        output.push_str(&format!(
            "Resource map starts at {:#x} and is {:#x} bytes long\n",
            info.map_offset, info.map_length
        ));
        output.push_str(&format!(
            "Resource map attributes: {}\n",
            file_attribute_names(info.file_attributes)
        ));
        output.push_str(&format!(
            "Resource map type list starts at {:#x} (relative to map start) and contains {} types\n",
            info.type_list_offset, info.type_count
        ));
        output.push_str(&format!(
            "Resource map name list starts at {:#x} (relative to map start)\n",
            info.name_list_offset
        ));
        output.push_str(&format!("Resources: {}\n", info.resource_count));

        output
    }

    fn format_list(&self, rows: &[ResourceRow], group: GroupBy, technical: bool) -> String {
        let mut output = String::new();

        if rows.is_empty() {
            output.push_str("No resources matched the filter\n");
            return output;
        }

        match group {
            GroupBy::None => {
                output.push_str(&format!("{} resources:\n", rows.len()));
                for row in rows {
                    output.push_str(&describe(row, true, technical));
                    output.push('\n');
                }
            }
            GroupBy::Type => {
                let groups = group_consecutive(rows, |r| r.res_type);
                output.push_str(&format!("{} resource types:\n", groups.len()));
                for group in groups {
                    output.push_str(&format!(
                        "{}: {} resources:\n",
                        quote(group[0].res_type.as_bytes(), '\''),
                        group.len()
                    ));
                    for row in group {
                        output.push_str(&describe(row, false, technical));
                        output.push('\n');
                    }
                    output.push('\n');
                }
            }
            GroupBy::Id => {
                let groups = group_consecutive(rows, |r| r.id);
                output.push_str(&format!("{} resource IDs:\n", groups.len()));
                for group in groups {
                    output.push_str(&format!("({}): {} resources:\n", group[0].id, group.len()));
                    for row in group {
                        output.push_str(&describe(row, true, technical));
                        output.push('\n');
                    }
                    output.push('\n');
                }
            }
        }

        let total: u64 = rows
            .iter()
            .map(|r| match r.length {
                Length::Plain(n) | Length::Compressed { length: n, .. } => u64::from(n),
                _ => 0,
            })
            .sum();
        output.push_str(&format!("{} resources, {} total\n", rows.len(), humanize_bytes(total)));

        output
    }

    fn format_compress_info(&self, header: &CompressedHeader) -> String {
        let mut output = String::new();

        output.push_str(&format!("Header length: {} bytes\n", header.header_length));
        output.push_str(&format!("Compression type: {:#06x}\n", header.compression_type));
        output.push_str(&format!(
            "Decompressed data length: {} bytes\n",
            header.decompressed_length
        ));
        output.push_str(&format!("'dcmp' resource ID: {}\n", header.codec_id));
        match header.kind {
            HeaderKind::Type8 {
                working_buffer_fractional_size,
                expansion_buffer_size,
            } => {
                output.push_str(&format!(
                    "Working buffer fractional size: {working_buffer_fractional_size} 256ths of compressed data length\n"
                ));
                output.push_str(&format!("Expansion buffer size: {expansion_buffer_size} bytes\n"));
            }
            HeaderKind::Type9 { parameters } => {
                output.push_str(&format!(
                    "Decompressor-specific parameters: {}\n",
                    raw_hex(&parameters)
                ));
            }
        }
        if header.codec().is_none() {
            output.push_str("Codec: unsupported\n");
        }

        output
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_info(&self, info: &FileInfo) -> String {
        let obj = json!({
            "fork": info.fork,
            "data_offset": info.data_offset,
            "data_length": info.data_length,
            "map_offset": info.map_offset,
            "map_length": info.map_length,
            "system_data": raw_hex(&info.system_data),
            "application_data": raw_hex(&info.application_data),
            "file_attributes": info.file_attributes.bits(),
            "type_list_offset": info.type_list_offset,
            "name_list_offset": info.name_list_offset,
            "type_count": info.type_count,
            "resource_count": info.resource_count,
        });

        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_list(&self, rows: &[ResourceRow], _group: GroupBy, _technical: bool) -> String {
        let items: Vec<_> = rows
            .iter()
            .map(|r| {
                let (length, raw_length, error) = match &r.length {
                    Length::Plain(n) => (Some(*n), Some(*n), None),
                    Length::Compressed { length, raw } => (Some(*length), Some(*raw), None),
                    Length::BadHeader { raw } => (
                        None,
                        Some(*raw),
                        Some("malformed compression header".to_string()),
                    ),
                    Length::Unreadable(e) => (None, None, Some(e.clone())),
                };
                json!({
                    "type": r.res_type.to_string(),
                    "id": r.id,
                    "name": r.name.as_deref().map(text::decode),
                    "attributes": r.attributes.bits(),
                    "data_offset": r.data_offset,
                    "length": length,
                    "raw_length": raw_length,
                    "crc32": r.crc32,
                    "error": error,
                })
            })
            .collect();

        serde_json::to_string_pretty(&items).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_compress_info(&self, header: &CompressedHeader) -> String {
        let obj = json!({
            "header_length": header.header_length,
            "compression_type": header.compression_type,
            "decompressed_length": header.decompressed_length,
            "codec_id": header.codec_id,
            "codec": header.codec().map(|c| c.name()),
            "working_buffer_fractional_size": header.working_buffer_fractional_size(),
            "expansion_buffer_size": header.expansion_buffer_size(),
            "parameters": header.parameters().map(|p| raw_hex(&p)),
        });

        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Creates the appropriate formatter based on output format
pub fn create_formatter(format: super::OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        super::OutputFormat::Human => Box::new(HumanFormatter),
        super::OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Splits rows into runs sharing a key.
fn group_consecutive<K: PartialEq>(
    rows: &[ResourceRow],
    key: impl Fn(&ResourceRow) -> K,
) -> Vec<&[ResourceRow]> {
    let mut groups = Vec::new();
    let mut start = 0;
    for i in 1..=rows.len() {
        if i == rows.len() || key(&rows[i]) != key(&rows[start]) {
            groups.push(&rows[start..i]);
            start = i;
        }
    }
    groups
}

/// One-line description of a resource.
pub fn describe(row: &ResourceRow, include_type: bool, technical: bool) -> String {
    let mut id_desc = row.id.to_string();
    if let Some(name) = &row.name {
        id_desc.push_str(", ");
        id_desc.push_str(&quote(name, '"'));
    }

    let mut parts = vec![match &row.length {
        Length::Plain(n) => format!("{n} bytes"),
        Length::Compressed { length, raw } => format!("{length} bytes ({raw} bytes compressed)"),
        Length::BadHeader { raw } => {
            format!("unparseable compressed data header ({raw} bytes compressed)")
        }
        Length::Unreadable(e) => format!("unreadable: {e}"),
    }];
    if !row.attributes.is_empty() {
        parts.push(attribute_names(row.attributes));
    }
    if technical {
        parts.push(format!("at {:#x}", row.data_offset));
        if let Some(crc) = row.crc32 {
            parts.push(format!("CRC {crc:08X}"));
        }
    }

    let desc = format!("({id_desc}): {}", parts.join(", "));
    if include_type {
        format!("{} {desc}", quote(row.res_type.as_bytes(), '\''))
    } else {
        desc
    }
}

fn attribute_names(attributes: ResourceAttrs) -> String {
    attributes
        .iter_names()
        .map(|(name, _)| name)
        .collect::<Vec<_>>()
        .join(" | ")
}

fn file_attribute_names(attributes: ResourceFileAttrs) -> String {
    if attributes.is_empty() {
        return "(none)".to_string();
    }
    let mut names: Vec<String> = attributes
        .iter_names()
        .map(|(name, _)| name.to_string())
        .collect();
    let known = ResourceFileAttrs::all()
        .iter_names()
        .fold(0, |acc, (_, f)| acc | f.bits());
    let unknown = attributes.bits() & !known;
    if unknown != 0 {
        names.push(format!("{unknown:#06x}"));
    }
    names.join(" | ")
}

/// Returns `true` for characters that can be shown as they are.
pub fn is_printable(c: char) -> bool {
    c == ' ' || !(c.is_control() || c.is_whitespace())
}

/// Decodes Mac OS Roman bytes, hex-escaping anything unprintable as well as
/// backslashes and `quote`.
pub fn escape(bytes: &[u8], quote: char) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &byte in bytes {
        let c = text::decode_byte(byte);
        if c == quote || c == '\\' {
            out.push('\\');
            out.push(c);
        } else if is_printable(c) {
            out.push(c);
        } else {
            out.push_str(&format!("\\x{byte:02x}"));
        }
    }
    out
}

/// Escapes and surrounds with `quote`.
pub fn quote(bytes: &[u8], quote: char) -> String {
    format!("{quote}{}{quote}", escape(bytes, quote))
}

/// Canonical hex dump: offset, 16 bytes in two groups, characters. Runs of
/// identical lines are collapsed into `*`.
pub fn hexdump(data: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut last: Option<&[u8]> = None;
    let mut asterisk_shown = false;

    for (i, line) in data.chunks(16).enumerate() {
        if last == Some(line) {
            if !asterisk_shown {
                lines.push("*".to_string());
                asterisk_shown = true;
            }
        } else {
            let (left, right) = line.split_at(line.len().min(8));
            let chars: String = line
                .iter()
                .map(|&b| text::decode_byte(b))
                .map(|c| if is_printable(c) { c } else { '.' })
                .collect();
            lines.push(format!(
                "{:08x}  {:<23}  {:<23}  |{chars}|",
                i * 16,
                raw_hex(left),
                raw_hex(right)
            ));
            asterisk_shown = false;
        }
        last = Some(line);
    }
    if !data.is_empty() {
        lines.push(format!("{:08x}", data.len()));
    }
    lines
}

/// Bytes as space-separated hex, 16 per line.
pub fn raw_hexdump(data: &[u8]) -> Vec<String> {
    data.chunks(16).map(raw_hex).collect()
}

fn raw_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decodes text and turns classic CR line endings into newlines.
pub fn translate_text(data: &[u8]) -> String {
    text::decode(data).replace('\r', "\n")
}

/// Converts bytes to a human-readable string
pub fn humanize_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
