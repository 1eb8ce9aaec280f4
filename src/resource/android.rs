use async_trait::async_trait;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::{HashMap, HashSet};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{Result, DroidlocError};
use crate::language::LanguageTag;
use super::{ResourceEntry, ResourceStore, validate_keys};

/// Android `strings.xml` backed resource store
#[derive(Debug, Clone, Default)]
pub struct AndroidXmlStore;

impl AndroidXmlStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ResourceStore for AndroidXmlStore {
    async fn load(&self, source: &Path) -> Result<Vec<ResourceEntry>> {
        debug!("Loading string resources from {}", source.display());

        let content = match fs::read_to_string(source).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(DroidlocError::NotFound(source.display().to_string()));
            }
            Err(e) => return Err(DroidlocError::Io(e)),
        };

        let entries = parse_strings(&content)
            .map_err(|msg| DroidlocError::Parse(format!("{}: {}", source.display(), msg)))?;
        info!("Loaded {} string entries from {}", entries.len(), source.display());
        Ok(entries)
    }

    async fn write(&self, target: &Path, language: LanguageTag, entries: &[ResourceEntry]) -> Result<()> {
        let document = match fs::read_to_string(target).await {
            Ok(existing) => {
                debug!("Merging {} {} entries into {}", entries.len(), language, target.display());
                merge_document(&existing, entries)
                    .map_err(|msg| DroidlocError::Parse(format!("{}: {}", target.display(), msg)))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => render_strings(entries)?,
            Err(e) => return Err(DroidlocError::Io(e)),
        };

        let dir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        fs::create_dir_all(&dir).await?;

        let target_path = target.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut tmp = NamedTempFile::new_in(&dir)?;
            tmp.write_all(document.as_bytes())?;
            tmp.flush()?;
            tmp.persist(&target_path).map_err(|e| DroidlocError::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| DroidlocError::Internal(format!("resource writer task failed: {}", e)))??;

        info!("Wrote {} {} entries to {}", entries.len(), language, target.display());
        Ok(())
    }
}

/// Parse the `<string>` children of a `<resources>` document.
///
/// Other resource kinds (`string-array`, `plurals`, ...) are skipped.
pub fn parse_strings(content: &str) -> std::result::Result<Vec<ResourceEntry>, String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut entries = Vec::new();
    let mut in_root = false;
    let mut saw_root = false;

    loop {
        let position = reader.buffer_position();
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if !in_root {
                    expect_root(&e, saw_root)?;
                    in_root = true;
                    saw_root = true;
                } else if e.name().as_ref() == b"string" {
                    let mut entry = string_attributes(&e)?;
                    entry.text = reader
                        .read_text(e.name())
                        .map_err(|err| format!("bad content in string '{}': {}", entry.key, err))?
                        .into_owned();
                    entries.push(entry);
                } else {
                    reader
                        .read_to_end(e.name())
                        .map_err(|err| format!("error at position {}: {}", position, err))?;
                }
            }
            Ok(Event::Empty(e)) => {
                if !in_root {
                    expect_root(&e, saw_root)?;
                    saw_root = true;
                } else if e.name().as_ref() == b"string" {
                    let entry = string_attributes(&e)?;
                    entries.push(entry);
                }
            }
            Ok(Event::End(_)) => in_root = false,
            Ok(Event::Text(t)) if !in_root => {
                return Err(format!(
                    "unexpected text outside <resources> at position {}: '{}'",
                    position,
                    String::from_utf8_lossy(t.as_ref()).trim()
                ));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(format!("error at position {}: {}", position, err)),
        }
    }

    if in_root {
        return Err("unexpected end of document inside <resources>".to_string());
    }
    if !saw_root {
        return Err("missing <resources> root element".to_string());
    }
    validate_keys(&entries)?;
    Ok(entries)
}

fn expect_root(e: &BytesStart<'_>, saw_root: bool) -> std::result::Result<(), String> {
    if saw_root {
        return Err("more than one root element".to_string());
    }
    if e.name().as_ref() != b"resources" {
        return Err(format!(
            "root element is <{}>, expected <resources>",
            String::from_utf8_lossy(e.name().as_ref())
        ));
    }
    Ok(())
}

/// Read a `<string>` start tag into an entry with empty text
fn string_attributes(e: &BytesStart<'_>) -> std::result::Result<ResourceEntry, String> {
    let mut key = None;
    let mut translatable = true;
    let mut attributes = Vec::new();

    for attr in e.attributes() {
        let attr = attr.map_err(|err| format!("bad attribute: {}", err))?;
        let value = attr
            .unescape_value()
            .map_err(|err| format!("bad attribute value: {}", err))?;
        match attr.key.as_ref() {
            b"name" => key = Some(value.into_owned()),
            b"translatable" => translatable = value.trim() != "false",
            other => attributes.push((String::from_utf8_lossy(other).into_owned(), value.into_owned())),
        }
    }

    let key = key.ok_or_else(|| "<string> element without a name attribute".to_string())?;
    let mut entry = ResourceEntry::new(key, String::new(), translatable);
    entry.attributes = attributes;
    Ok(entry)
}

fn write_string<W: Write>(writer: &mut Writer<W>, entry: &ResourceEntry) -> quick_xml::Result<()> {
    let mut start = BytesStart::new("string");
    start.push_attribute(("name", entry.key.as_str()));
    if !entry.translatable {
        start.push_attribute(("translatable", "false"));
    }
    for (name, value) in &entry.attributes {
        start.push_attribute((name.as_str(), value.as_str()));
    }
    write_element(writer, start, &entry.text)
}

fn write_element<W: Write>(writer: &mut Writer<W>, start: BytesStart<'_>, text: &str) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(start))?;
    // Text is already in its escaped on-disk form
    writer.write_event(Event::Text(BytesText::from_escaped(text)))?;
    writer.write_event(Event::End(BytesEnd::new("string")))
}

/// Serialize entries as a `strings.xml` document
pub fn render_strings(entries: &[ResourceEntry]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("resources")))?;
    for entry in entries {
        write_string(&mut writer, entry)?;
    }
    writer.write_event(Event::End(BytesEnd::new("resources")))?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes).map_err(|e| DroidlocError::Internal(format!("non UTF-8 XML output: {}", e)))
}

/// Merge freshly translated entries into an existing `strings.xml` document.
///
/// Only the text of translatable `<string>` elements named in `incoming`
/// changes; every other byte of the document (plurals, arrays, comments,
/// root attributes, non-translatable strings) is copied through. Keys the
/// document lacks are appended before `</resources>` in input order.
pub fn merge_document(existing: &str, incoming: &[ResourceEntry]) -> std::result::Result<String, String> {
    let existing = existing.strip_prefix('\u{feff}').unwrap_or(existing);
    let present: HashSet<String> = parse_strings(existing)?.into_iter().map(|e| e.key).collect();
    let updates: HashMap<&str, &ResourceEntry> =
        incoming.iter().map(|e| (e.key.as_str(), e)).collect();
    let appended: Vec<&ResourceEntry> = incoming.iter().filter(|e| !present.contains(&e.key)).collect();

    let mut reader = Reader::from_str(existing);
    let mut writer = Writer::new(Vec::new());
    let mut depth = 0usize;

    loop {
        let position = reader.buffer_position();
        let event = reader
            .read_event()
            .map_err(|err| format!("error at position {}: {}", position, err))?;
        match event {
            Event::Start(e) if depth == 1 && e.name().as_ref() == b"string" => {
                match replacement(&e, &updates)? {
                    Some(update) => {
                        reader
                            .read_to_end(e.name())
                            .map_err(|err| format!("error at position {}: {}", position, err))?;
                        write_element(&mut writer, e, &update.text).map_err(xml_error)?;
                    }
                    None => {
                        depth += 1;
                        writer.write_event(Event::Start(e)).map_err(xml_error)?;
                    }
                }
            }
            Event::Empty(e) if depth == 1 && e.name().as_ref() == b"string" => {
                match replacement(&e, &updates)? {
                    Some(update) => write_element(&mut writer, e, &update.text).map_err(xml_error)?,
                    None => writer.write_event(Event::Empty(e)).map_err(xml_error)?,
                }
            }
            Event::Empty(root) if depth == 0 => {
                // <resources/>
                writer.write_event(Event::Start(root)).map_err(xml_error)?;
                writer
                    .write_event(Event::Text(BytesText::from_escaped("\n")))
                    .map_err(xml_error)?;
                append_strings(&mut writer, &appended).map_err(xml_error)?;
                writer
                    .write_event(Event::End(BytesEnd::new("resources")))
                    .map_err(xml_error)?;
            }
            Event::Start(e) => {
                depth += 1;
                writer.write_event(Event::Start(e)).map_err(xml_error)?;
            }
            Event::End(e) => {
                if depth == 1 {
                    append_strings(&mut writer, &appended).map_err(xml_error)?;
                }
                depth = depth.saturating_sub(1);
                writer.write_event(Event::End(e)).map_err(xml_error)?;
            }
            Event::Eof => break,
            other => writer.write_event(other).map_err(xml_error)?,
        }
    }

    String::from_utf8(writer.into_inner()).map_err(|e| format!("non UTF-8 XML output: {}", e))
}

/// Incoming entry replacing the text of `start`, if any
fn replacement<'a>(
    start: &BytesStart<'_>,
    updates: &HashMap<&str, &'a ResourceEntry>,
) -> std::result::Result<Option<&'a ResourceEntry>, String> {
    let existing = string_attributes(start)?;
    if !existing.translatable {
        return Ok(None);
    }
    Ok(updates.get(existing.key.as_str()).copied())
}

fn append_strings<W: Write>(writer: &mut Writer<W>, entries: &[&ResourceEntry]) -> quick_xml::Result<()> {
    for entry in entries {
        writer.write_event(Event::Text(BytesText::from_escaped("    ")))?;
        write_string(writer, entry)?;
        writer.write_event(Event::Text(BytesText::from_escaped("\n")))?;
    }
    Ok(())
}

fn xml_error(err: quick_xml::Error) -> String {
    format!("cannot write merged document: {}", err)
}
