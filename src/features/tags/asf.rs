//! ASF (WMA) header codec
//!
//! Reads the attributes stored in the Content Description, Extended Content
//! Description and Metadata Library objects of an ASF Header Object, and
//! writes them back. Every other header object is carried through untouched.

use std::io::{self, Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

type Guid = [u8; 16];

const HEADER_OBJECT: Guid = [
    0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C,
];
const CONTENT_DESCRIPTION: Guid = [
    0x33, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C,
];
const EXTENDED_CONTENT_DESCRIPTION: Guid = [
    0x40, 0xA4, 0xD0, 0xD2, 0x07, 0xE3, 0xD2, 0x11, 0x97, 0xF0, 0x00, 0xA0, 0xC9, 0x5E, 0xA8, 0x50,
];
const FILE_PROPERTIES: Guid = [
    0xA1, 0xDC, 0xAB, 0x8C, 0x47, 0xA9, 0xCF, 0x11, 0x8E, 0xE4, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65,
];
const HEADER_EXTENSION: Guid = [
    0xB5, 0x03, 0xBF, 0x5F, 0x2E, 0xA9, 0xCF, 0x11, 0x8E, 0xE3, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65,
];
const HEADER_EXTENSION_RESERVED: Guid = [
    0x11, 0xD2, 0xD3, 0xAB, 0xBA, 0xA9, 0xCF, 0x11, 0x8E, 0xE6, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65,
];
const METADATA_LIBRARY: Guid = [
    0x94, 0x1C, 0x23, 0x44, 0x98, 0x94, 0xD1, 0x49, 0xA1, 0x41, 0x1D, 0x13, 0x4E, 0x45, 0x70, 0x54,
];

/// Object header: GUID plus 64-bit size
const OBJECT_HEADER_LEN: u64 = 24;

/// Attribute names stored in the Content Description Object, in field order
pub const CONTENT_DESCRIPTION_FIELDS: [&str; 5] =
    ["Title", "Author", "Copyright", "Description", "Rating"];

/// Attribute name of embedded pictures
pub const PICTURE_ATTRIBUTE: &str = "WM/Picture";

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn read_guid<R: Read>(reader: &mut R) -> io::Result<Guid> {
    let mut guid = [0u8; 16];
    reader.read_exact(&mut guid)?;
    Ok(guid)
}

fn read_bytes<R: Read>(reader: &mut R, len: u64) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.take(len).read_to_end(&mut buf)?;
    if buf.len() as u64 != len {
        return Err(invalid("truncated ASF object"));
    }
    Ok(buf)
}

fn decode_utf16(bytes: &[u8]) -> io::Result<String> {
    let words: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    let mut text = String::from_utf16(&words).map_err(|_| invalid("invalid UTF-16 string"))?;
    while text.ends_with('\0') {
        text.pop();
    }
    Ok(text)
}

/// UTF-16LE with a NUL terminator
fn encode_utf16(text: &str) -> Vec<u8> {
    text.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

fn read_terminated_utf16<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut words = Vec::new();
    loop {
        let word = reader.read_u16::<LittleEndian>()?;
        if word == 0 {
            break;
        }
        words.push(word);
    }
    String::from_utf16(&words).map_err(|_| invalid("invalid UTF-16 string"))
}

/// Typed attribute value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsfValue {
    Unicode(String),
    Bytes(Vec<u8>),
    Bool(bool),
    DWord(u32),
    QWord(u64),
    Word(u16),
}

impl AsfValue {
    fn type_id(&self) -> u16 {
        match self {
            Self::Unicode(_) => 0,
            Self::Bytes(_) => 1,
            Self::Bool(_) => 2,
            Self::DWord(_) => 3,
            Self::QWord(_) => 4,
            Self::Word(_) => 5,
        }
    }

    /// Text form of the value, if it has one
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Unicode(s) => Some(s.clone()),
            Self::Bytes(_) => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::DWord(n) => Some(n.to_string()),
            Self::QWord(n) => Some(n.to_string()),
            Self::Word(n) => Some(n.to_string()),
        }
    }

    /// `wide_bool` selects the 32-bit BOOL of the Extended Content Description
    fn encode(&self, wide_bool: bool) -> Vec<u8> {
        match self {
            Self::Unicode(s) => encode_utf16(s),
            Self::Bytes(b) => b.clone(),
            Self::Bool(b) if wide_bool => u32::from(*b).to_le_bytes().to_vec(),
            Self::Bool(b) => u16::from(*b).to_le_bytes().to_vec(),
            Self::DWord(n) => n.to_le_bytes().to_vec(),
            Self::QWord(n) => n.to_le_bytes().to_vec(),
            Self::Word(n) => n.to_le_bytes().to_vec(),
        }
    }

    fn decode(type_id: u16, data: Vec<u8>) -> io::Result<Self> {
        let mut cursor = Cursor::new(&data);
        let value = match type_id {
            0 => Self::Unicode(decode_utf16(&data)?),
            2 => Self::Bool(data.iter().any(|b| *b != 0)),
            3 => Self::DWord(cursor.read_u32::<LittleEndian>()?),
            4 => Self::QWord(cursor.read_u64::<LittleEndian>()?),
            5 => Self::Word(cursor.read_u16::<LittleEndian>()?),
            // byte arrays and GUIDs
            _ => Self::Bytes(data),
        };
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsfAttribute {
    pub name: String,
    pub value: AsfValue,
}

/// Decoded `WM/Picture` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsfPicture {
    pub pic_type: u8,
    pub mime: String,
    pub description: String,
    pub data: Vec<u8>,
}

impl AsfPicture {
    pub fn parse(bytes: &[u8]) -> io::Result<Self> {
        let mut reader = Cursor::new(bytes);
        let pic_type = reader.read_u8()?;
        let len = reader.read_u32::<LittleEndian>()?;
        let mime = read_terminated_utf16(&mut reader)?;
        let description = read_terminated_utf16(&mut reader)?;
        let data = read_bytes(&mut reader, u64::from(len))?;
        Ok(Self {
            pic_type,
            mime,
            description,
            data,
        })
    }

    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let len = u32::try_from(self.data.len()).map_err(|_| invalid("picture too large"))?;
        let mut out = Vec::with_capacity(self.data.len() + 64);
        out.write_u8(self.pic_type)?;
        out.write_u32::<LittleEndian>(len)?;
        out.extend_from_slice(&encode_utf16(&self.mime));
        out.extend_from_slice(&encode_utf16(&self.description));
        out.extend_from_slice(&self.data);
        Ok(out)
    }
}

#[derive(Debug, Clone)]
struct RawObject {
    guid: Guid,
    data: Vec<u8>,
}

impl RawObject {
    fn write_to(&self, out: &mut Vec<u8>) -> io::Result<()> {
        out.extend_from_slice(&self.guid);
        out.write_u64::<LittleEndian>(self.data.len() as u64 + OBJECT_HEADER_LEN)?;
        out.extend_from_slice(&self.data);
        Ok(())
    }
}

/// Parsed ASF Header Object
#[derive(Debug, Clone)]
pub struct AsfHeader {
    reserved: [u8; 2],
    objects: Vec<RawObject>,
    /// Length of the header as found on disk
    original_len: u64,
    pub attributes: Vec<AsfAttribute>,
}

impl AsfHeader {
    /// Parse the header at the start of `bytes`
    pub fn parse(bytes: &[u8]) -> io::Result<Self> {
        let mut reader = Cursor::new(bytes);
        if read_guid(&mut reader)? != HEADER_OBJECT {
            return Err(invalid("missing ASF header object"));
        }
        let original_len = reader.read_u64::<LittleEndian>()?;
        if original_len > bytes.len() as u64 {
            return Err(invalid("ASF header larger than file"));
        }
        let count = reader.read_u32::<LittleEndian>()?;
        let mut reserved = [0u8; 2];
        reader.read_exact(&mut reserved)?;

        let mut objects = Vec::with_capacity(count as usize);
        let mut attributes = Vec::new();
        for _ in 0..count {
            let guid = read_guid(&mut reader)?;
            let size = reader.read_u64::<LittleEndian>()?;
            if size < OBJECT_HEADER_LEN {
                return Err(invalid("ASF object smaller than its header"));
            }
            let data = read_bytes(&mut reader, size - OBJECT_HEADER_LEN)?;

            match guid {
                CONTENT_DESCRIPTION => attributes.extend(parse_content_description(&data)?),
                EXTENDED_CONTENT_DESCRIPTION => {
                    attributes.extend(parse_extended_content(&data)?)
                }
                HEADER_EXTENSION => {
                    let (kept, library) = split_header_extension(&data)?;
                    attributes.extend(library);
                    objects.push(RawObject { guid, data: kept });
                }
                _ => objects.push(RawObject { guid, data }),
            }
        }

        Ok(Self {
            reserved,
            objects,
            original_len,
            attributes,
        })
    }

    /// Length of the header this was parsed from
    pub fn original_len(&self) -> u64 {
        self.original_len
    }

    pub fn get(&self, name: &str) -> Option<&AsfValue> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| &a.value)
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a AsfValue> + 'a {
        self.attributes
            .iter()
            .filter(move |a| a.name.eq_ignore_ascii_case(name))
            .map(|a| &a.value)
    }

    /// Replace every attribute called `name` with one value
    pub fn set(&mut self, name: &str, value: AsfValue) {
        self.remove(name);
        self.attributes.push(AsfAttribute {
            name: name.to_string(),
            value,
        });
    }

    pub fn remove(&mut self, name: &str) {
        self.attributes.retain(|a| !a.name.eq_ignore_ascii_case(name));
    }

    pub fn pictures(&self) -> Vec<AsfPicture> {
        self.get_all(PICTURE_ATTRIBUTE)
            .filter_map(|value| match value {
                AsfValue::Bytes(bytes) => AsfPicture::parse(bytes).ok(),
                _ => None,
            })
            .collect()
    }

    /// Serialize the header, with the file size field set for `body_len`
    /// bytes of data following it
    pub fn to_bytes(&self, body_len: u64) -> io::Result<Vec<u8>> {
        let mut content = Vec::new();
        let mut extended = Vec::new();
        let mut library = Vec::new();
        for attribute in &self.attributes {
            if CONTENT_DESCRIPTION_FIELDS
                .iter()
                .any(|f| f.eq_ignore_ascii_case(&attribute.name))
            {
                content.push(attribute);
            } else if attribute.value.encode(true).len() <= u16::MAX as usize {
                extended.push(attribute);
            } else {
                library.push(attribute);
            }
        }

        let mut objects = Vec::with_capacity(self.objects.len() + 2);
        let mut has_extension = false;
        for object in &self.objects {
            if object.guid == HEADER_EXTENSION {
                has_extension = true;
                let mut data = object.data.clone();
                append_metadata_library(&mut data, &library)?;
                objects.push(RawObject {
                    guid: HEADER_EXTENSION,
                    data,
                });
            } else {
                objects.push(object.clone());
            }
        }
        if !has_extension && !library.is_empty() {
            let mut data = empty_header_extension();
            append_metadata_library(&mut data, &library)?;
            objects.push(RawObject {
                guid: HEADER_EXTENSION,
                data,
            });
        }
        if !content.is_empty() {
            objects.push(RawObject {
                guid: CONTENT_DESCRIPTION,
                data: encode_content_description(&content)?,
            });
        }
        if !extended.is_empty() {
            objects.push(RawObject {
                guid: EXTENDED_CONTENT_DESCRIPTION,
                data: encode_extended_content(&extended)?,
            });
        }

        let mut body = Vec::new();
        for object in &objects {
            object.write_to(&mut body)?;
        }

        let header_len = OBJECT_HEADER_LEN + 4 + 2 + body.len() as u64;
        let file_len = header_len + body_len;

        let mut out = Vec::with_capacity(header_len as usize);
        out.extend_from_slice(&HEADER_OBJECT);
        out.write_u64::<LittleEndian>(header_len)?;
        out.write_u32::<LittleEndian>(objects.len() as u32)?;
        out.extend_from_slice(&self.reserved);
        out.extend_from_slice(&body);

        patch_file_size(&mut out, file_len);
        Ok(out)
    }
}

/// Update the File Properties Object's file size field in a serialized header
fn patch_file_size(header: &mut [u8], file_len: u64) {
    let mut pos = (OBJECT_HEADER_LEN + 4 + 2) as usize;
    while pos + OBJECT_HEADER_LEN as usize <= header.len() {
        let guid = &header[pos..pos + 16];
        let mut size_bytes = [0u8; 8];
        size_bytes.copy_from_slice(&header[pos + 16..pos + 24]);
        let size = u64::from_le_bytes(size_bytes) as usize;
        if guid == FILE_PROPERTIES {
            // object header, then the 16-byte File ID, then File Size
            let field = pos + OBJECT_HEADER_LEN as usize + 16;
            if field + 8 <= header.len() {
                header[field..field + 8].copy_from_slice(&file_len.to_le_bytes());
            }
            return;
        }
        if size == 0 {
            return;
        }
        pos += size;
    }
}

fn parse_content_description(data: &[u8]) -> io::Result<Vec<AsfAttribute>> {
    let mut reader = Cursor::new(data);
    let mut lengths = [0u16; 5];
    for len in lengths.iter_mut() {
        *len = reader.read_u16::<LittleEndian>()?;
    }

    let mut attributes = Vec::new();
    for (name, len) in CONTENT_DESCRIPTION_FIELDS.iter().zip(lengths) {
        let text = decode_utf16(&read_bytes(&mut reader, u64::from(len))?)?;
        if !text.is_empty() {
            attributes.push(AsfAttribute {
                name: name.to_string(),
                value: AsfValue::Unicode(text),
            });
        }
    }
    Ok(attributes)
}

fn encode_content_description(attributes: &[&AsfAttribute]) -> io::Result<Vec<u8>> {
    let fields: Vec<Vec<u8>> = CONTENT_DESCRIPTION_FIELDS
        .iter()
        .map(|field| {
            attributes
                .iter()
                .find(|a| a.name.eq_ignore_ascii_case(field))
                .and_then(|a| a.value.as_text())
                .map(|text| encode_utf16(&text))
                .unwrap_or_default()
        })
        .collect();

    let mut out = Vec::new();
    for field in &fields {
        let len = u16::try_from(field.len()).map_err(|_| invalid("description field too long"))?;
        out.write_u16::<LittleEndian>(len)?;
    }
    for field in fields {
        out.write_all(&field)?;
    }
    Ok(out)
}

fn parse_extended_content(data: &[u8]) -> io::Result<Vec<AsfAttribute>> {
    let mut reader = Cursor::new(data);
    let count = reader.read_u16::<LittleEndian>()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_len = reader.read_u16::<LittleEndian>()?;
        let name = decode_utf16(&read_bytes(&mut reader, u64::from(name_len))?)?;
        let type_id = reader.read_u16::<LittleEndian>()?;
        let value_len = reader.read_u16::<LittleEndian>()?;
        let value = AsfValue::decode(type_id, read_bytes(&mut reader, u64::from(value_len))?)?;
        attributes.push(AsfAttribute { name, value });
    }
    Ok(attributes)
}

fn encode_extended_content(attributes: &[&AsfAttribute]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    out.write_u16::<LittleEndian>(attributes.len() as u16)?;
    for attribute in attributes {
        let name = encode_utf16(&attribute.name);
        let value = attribute.value.encode(true);
        out.write_u16::<LittleEndian>(name.len() as u16)?;
        out.write_all(&name)?;
        out.write_u16::<LittleEndian>(attribute.value.type_id())?;
        out.write_u16::<LittleEndian>(value.len() as u16)?;
        out.write_all(&value)?;
    }
    Ok(out)
}

fn empty_header_extension() -> Vec<u8> {
    let mut data = Vec::with_capacity(22);
    data.extend_from_slice(&HEADER_EXTENSION_RESERVED);
    data.extend_from_slice(&6u16.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    data
}

/// Split a Header Extension Object's data into the data without its Metadata
/// Library Object, plus the attributes that object held
fn split_header_extension(data: &[u8]) -> io::Result<(Vec<u8>, Vec<AsfAttribute>)> {
    let mut reader = Cursor::new(data);
    let reserved = read_guid(&mut reader)?;
    let reserved2 = reader.read_u16::<LittleEndian>()?;
    let inner_len = reader.read_u32::<LittleEndian>()?;
    let inner = read_bytes(&mut reader, u64::from(inner_len))?;

    let mut kept = Vec::new();
    let mut attributes = Vec::new();
    let mut inner_reader = Cursor::new(&inner);
    while inner_reader.position() < inner.len() as u64 {
        let guid = read_guid(&mut inner_reader)?;
        let size = inner_reader.read_u64::<LittleEndian>()?;
        if size < OBJECT_HEADER_LEN {
            return Err(invalid("ASF object smaller than its header"));
        }
        let object_data = read_bytes(&mut inner_reader, size - OBJECT_HEADER_LEN)?;
        if guid == METADATA_LIBRARY {
            attributes.extend(parse_metadata_library(&object_data)?);
        } else {
            RawObject {
                guid,
                data: object_data,
            }
            .write_to(&mut kept)?;
        }
    }

    let mut out = Vec::with_capacity(22 + kept.len());
    out.extend_from_slice(&reserved);
    out.write_u16::<LittleEndian>(reserved2)?;
    out.write_u32::<LittleEndian>(kept.len() as u32)?;
    out.extend_from_slice(&kept);
    Ok((out, attributes))
}

fn parse_metadata_library(data: &[u8]) -> io::Result<Vec<AsfAttribute>> {
    let mut reader = Cursor::new(data);
    let count = reader.read_u16::<LittleEndian>()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let _language = reader.read_u16::<LittleEndian>()?;
        let _stream = reader.read_u16::<LittleEndian>()?;
        let name_len = reader.read_u16::<LittleEndian>()?;
        let type_id = reader.read_u16::<LittleEndian>()?;
        let value_len = reader.read_u32::<LittleEndian>()?;
        let name = decode_utf16(&read_bytes(&mut reader, u64::from(name_len))?)?;
        let value = AsfValue::decode(type_id, read_bytes(&mut reader, u64::from(value_len))?)?;
        attributes.push(AsfAttribute { name, value });
    }
    Ok(attributes)
}

/// Append a Metadata Library Object to Header Extension data, fixing up its
/// inner length field
fn append_metadata_library(extension: &mut Vec<u8>, attributes: &[&AsfAttribute]) -> io::Result<()> {
    if attributes.is_empty() {
        return Ok(());
    }

    let mut records = Vec::new();
    records.write_u16::<LittleEndian>(attributes.len() as u16)?;
    for attribute in attributes {
        let name = encode_utf16(&attribute.name);
        let value = attribute.value.encode(false);
        let value_len = u32::try_from(value.len()).map_err(|_| invalid("attribute too large"))?;
        records.write_u16::<LittleEndian>(0)?;
        records.write_u16::<LittleEndian>(0)?;
        records.write_u16::<LittleEndian>(name.len() as u16)?;
        records.write_u16::<LittleEndian>(attribute.value.type_id())?;
        records.write_u32::<LittleEndian>(value_len)?;
        records.write_all(&name)?;
        records.write_all(&value)?;
    }

    RawObject {
        guid: METADATA_LIBRARY,
        data: records,
    }
    .write_to(extension)?;

    // reserved GUID (16) + reserved u16 (2), then the inner length
    let inner_len = (extension.len() - 22) as u32;
    extension[18..22].copy_from_slice(&inner_len.to_le_bytes());
    Ok(())
}
