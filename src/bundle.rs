use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};

const MAGIC: [u8; 4] = *b"BATL";

/// Payload category of a bundle entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// The atlas XML document. A bundle carries exactly one.
    Atlas,
    /// An OBJ mesh referenced by a structure's `<mesh>` tag.
    Mesh,
    /// Anything else the content tools pack alongside (notes, licenses).
    Opaque,
}

impl EntryKind {
    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::Atlas),
            1 => Ok(Self::Mesh),
            2 => Ok(Self::Opaque),
            other => Err(anyhow!("unknown entry kind tag {other}")),
        }
    }

    fn tag(self) -> u8 {
        match self {
            Self::Atlas => 0,
            Self::Mesh => 1,
            Self::Opaque => 2,
        }
    }
}

/// One row of the bundle entry table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFileEntry {
    pub name: String,
    pub kind: EntryKind,
    pub offset: u64,
    pub size: u64,
}

/// A parsed `.atlas` content bundle, held in memory.
///
/// Layout: the `BATL` magic, a u32 format version, a u32 entry count, the
/// entry table (kind tag, u16 name length, name bytes, u64 payload offset,
/// u64 payload size per row, all integers little-endian), then the packed
/// payloads. The table sits up front so the whole index is validated before
/// any payload is touched; every row is bounds-checked against the file and
/// exactly one row must carry the atlas document.
#[derive(Debug, Clone)]
pub struct AtlasBundle {
    data: Arc<[u8]>,
    version: u32,
    files: Vec<BundleFileEntry>,
    atlas_xml: String,
}

impl AtlasBundle {
    /// Reads and parses a bundle from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .with_context(|| format!("unable to open {}", path.display()))?;
        Self::from_bytes(data)
    }

    /// Parses a bundle from bytes already resident in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let data: Arc<[u8]> = Arc::from(data.into_boxed_slice());
        let mut reader = ByteReader::new(&data);

        let magic = reader.bytes(4).context("bundle header truncated")?;
        if magic != MAGIC {
            bail!("not an atlas bundle: expected BATL magic, found {magic:?}");
        }
        let version = reader.u32().context("bundle header truncated")?;
        let entry_count = reader.u32().context("bundle header truncated")?;

        let mut files = Vec::new();
        let mut atlas_entry: Option<BundleFileEntry> = None;
        for index in 0..entry_count {
            let entry = read_entry(&mut reader)
                .with_context(|| format!("entry {index} of {entry_count} is malformed"))?;
            if entry
                .offset
                .checked_add(entry.size)
                .filter(|end| *end <= data.len() as u64)
                .is_none()
            {
                bail!(
                    "entry {} payload is out of bounds (offset={}, size={}, bundle={})",
                    entry.name,
                    entry.offset,
                    entry.size,
                    data.len()
                );
            }
            if entry.kind == EntryKind::Atlas {
                if atlas_entry.is_some() {
                    bail!("bundle contains more than one atlas document");
                }
                atlas_entry = Some(entry.clone());
            }
            files.push(entry);
        }

        let atlas_entry =
            atlas_entry.ok_or_else(|| anyhow!("bundle contains no atlas document"))?;
        let start = atlas_entry.offset as usize;
        let end = start + atlas_entry.size as usize;
        let atlas_xml = std::str::from_utf8(&data[start..end])
            .context("atlas XML is not valid UTF-8")?
            .to_string();

        Ok(Self {
            data,
            version,
            files,
            atlas_xml,
        })
    }

    /// Returns the content version stored in the bundle header.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns the raw atlas XML contained in the bundle.
    pub fn atlas_xml(&self) -> &str {
        &self.atlas_xml
    }

    /// Returns every entry in table order.
    pub fn files(&self) -> &[BundleFileEntry] {
        &self.files
    }

    /// Entries carrying mesh payloads.
    pub fn mesh_entries(&self) -> impl Iterator<Item = &BundleFileEntry> {
        self.files
            .iter()
            .filter(|entry| entry.kind == EntryKind::Mesh)
    }

    /// Looks up an entry by name.
    pub fn file(&self, name: &str) -> Option<&BundleFileEntry> {
        self.files.iter().find(|entry| entry.name == name)
    }

    /// Extracts the raw bytes for the named entry.
    pub fn extract_file(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .file(name)
            .ok_or_else(|| anyhow!("file not found in bundle: {name}"))?;
        self.extract_entry(entry)
    }

    /// Extracts the raw bytes for a previously looked-up entry.
    pub fn extract_entry(&self, entry: &BundleFileEntry) -> Result<Vec<u8>> {
        let start = entry.offset as usize;
        let end = start
            .checked_add(entry.size as usize)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| anyhow!("entry {} extends past bundle bounds", entry.name))?;
        Ok(self.data[start..end].to_vec())
    }
}

/// Assembles the bundle byte stream. The content tools and the test fixtures
/// both go through this, so the writer and the parser cannot drift apart.
#[derive(Debug, Default)]
pub struct BundleBuilder {
    version: u32,
    entries: Vec<(EntryKind, String, Vec<u8>)>,
}

impl BundleBuilder {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            entries: Vec::new(),
        }
    }

    pub fn atlas(mut self, xml: &str) -> Self {
        self.entries
            .push((EntryKind::Atlas, "atlas.xml".into(), xml.as_bytes().to_vec()));
        self
    }

    pub fn mesh(mut self, name: &str, obj: &[u8]) -> Self {
        self.entries
            .push((EntryKind::Mesh, name.into(), obj.to_vec()));
        self
    }

    pub fn opaque(mut self, name: &str, bytes: &[u8]) -> Self {
        self.entries
            .push((EntryKind::Opaque, name.into(), bytes.to_vec()));
        self
    }

    pub fn finish(self) -> Vec<u8> {
        let table_len: usize = self
            .entries
            .iter()
            .map(|(_, name, _)| 1 + 2 + name.len() + 8 + 8)
            .sum();
        let payload_len: usize = self.entries.iter().map(|(_, _, data)| data.len()).sum();
        let header_len = MAGIC.len() + 4 + 4;

        let mut buffer = Vec::with_capacity(header_len + table_len + payload_len);
        buffer.extend_from_slice(&MAGIC);
        buffer.extend_from_slice(&self.version.to_le_bytes());
        buffer.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());

        let mut payload_offset = (header_len + table_len) as u64;
        for (kind, name, payload) in &self.entries {
            buffer.push(kind.tag());
            buffer.extend_from_slice(&(name.len() as u16).to_le_bytes());
            buffer.extend_from_slice(name.as_bytes());
            buffer.extend_from_slice(&payload_offset.to_le_bytes());
            buffer.extend_from_slice(&(payload.len() as u64).to_le_bytes());
            payload_offset += payload.len() as u64;
        }
        for (_, _, payload) in &self.entries {
            buffer.extend_from_slice(payload);
        }
        buffer
    }
}

/// Little-endian reader over the bundle bytes.
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| anyhow!("unexpected end of bundle at byte {}", self.pos))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(
            self.bytes(2)?.try_into().expect("length checked"),
        ))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(
            self.bytes(4)?.try_into().expect("length checked"),
        ))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(
            self.bytes(8)?.try_into().expect("length checked"),
        ))
    }
}

fn read_entry(reader: &mut ByteReader<'_>) -> Result<BundleFileEntry> {
    let kind = EntryKind::from_tag(reader.u8()?)?;
    let name_len = reader.u16()? as usize;
    let name = std::str::from_utf8(reader.bytes(name_len)?)
        .context("entry name is not valid UTF-8")?
        .to_string();
    let offset = reader.u64()?;
    let size = reader.u64()?;
    Ok(BundleFileEntry {
        name,
        kind,
        offset,
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    static ATLAS_XML: Lazy<String> = Lazy::new(|| {
        "<atlas>\n  <structure>\n    <name>Frontal Lobe</name>\n    <region>lobe</region>\n  </structure>\n</atlas>\n"
            .to_string()
    });

    fn sample_bundle_bytes() -> Vec<u8> {
        BundleBuilder::new(1)
            .mesh("meshes/frontal.obj", b"v 0 0 0\n")
            .atlas(&ATLAS_XML)
            .finish()
    }

    #[test]
    fn open_bundle_reads_atlas_and_meshes() {
        let mut tmp = NamedTempFile::new().expect("tmp file");
        tmp.write_all(&sample_bundle_bytes()).expect("write bundle");

        let bundle = AtlasBundle::open(tmp.path()).expect("open bundle");
        assert_eq!(bundle.version(), 1);
        assert_eq!(bundle.atlas_xml(), ATLAS_XML.as_str());
        assert_eq!(bundle.files().len(), 2);
        assert_eq!(bundle.mesh_entries().count(), 1);
        assert_eq!(
            bundle.mesh_entries().next().unwrap().name,
            "meshes/frontal.obj"
        );
    }

    #[test]
    fn extract_file_returns_payload_bytes() {
        let bundle = AtlasBundle::from_bytes(sample_bundle_bytes()).unwrap();
        let bytes = bundle.extract_file("meshes/frontal.obj").unwrap();
        assert_eq!(bytes, b"v 0 0 0\n");
    }

    #[test]
    fn extract_missing_file_is_error() {
        let bundle = AtlasBundle::from_bytes(sample_bundle_bytes()).unwrap();
        assert!(bundle.extract_file("meshes/missing.obj").is_err());
    }

    #[test]
    fn opaque_entries_are_listed_but_not_meshes() {
        let bytes = BundleBuilder::new(3)
            .atlas(&ATLAS_XML)
            .opaque("LICENSE", b"CC-BY 4.0")
            .finish();
        let bundle = AtlasBundle::from_bytes(bytes).unwrap();
        assert_eq!(bundle.version(), 3);
        assert_eq!(bundle.files().len(), 2);
        assert_eq!(bundle.mesh_entries().count(), 0);
        assert_eq!(bundle.extract_file("LICENSE").unwrap(), b"CC-BY 4.0");
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut bytes = sample_bundle_bytes();
        bytes[..4].copy_from_slice(b"CGME");
        assert!(AtlasBundle::from_bytes(bytes).is_err());
    }

    #[test]
    fn missing_atlas_document_is_rejected() {
        let bytes = BundleBuilder::new(1)
            .mesh("meshes/frontal.obj", b"v 0 0 0\n")
            .finish();
        let err = AtlasBundle::from_bytes(bytes).unwrap_err();
        assert!(err.to_string().contains("no atlas document"));
    }

    #[test]
    fn duplicate_atlas_document_is_rejected() {
        let bytes = BundleBuilder::new(1)
            .atlas(&ATLAS_XML)
            .atlas(&ATLAS_XML)
            .finish();
        let err = AtlasBundle::from_bytes(bytes).unwrap_err();
        assert!(err.to_string().contains("more than one atlas"));
    }

    #[test]
    fn truncated_table_is_rejected() {
        let mut bytes = sample_bundle_bytes();
        // Cut into the middle of the entry table.
        bytes.truncate(20);
        assert!(AtlasBundle::from_bytes(bytes).is_err());
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let mut bytes = sample_bundle_bytes();
        // The atlas payload sits last; dropping its tail leaves a table row
        // pointing past the end of the file.
        bytes.truncate(bytes.len() - 4);
        let err = AtlasBundle::from_bytes(bytes).unwrap_err();
        assert!(err.to_string().contains("out of bounds"));
    }

    #[test]
    fn unknown_entry_kind_is_rejected() {
        let mut bytes = sample_bundle_bytes();
        // First table row starts right after the 12-byte header.
        bytes[12] = 9;
        assert!(AtlasBundle::from_bytes(bytes).is_err());
    }
}
