use std::collections::HashMap;

use crate::{
    axml::{
        chunk::{ChunkHeader, ChunkType, CHUNK_HEADER_SIZE},
        document::{attach, XmlAttribute, XmlDocument, XmlElement},
        stringpool::StringPool,
        value::{format_value, ValueType},
    },
    file::parser::Parser,
    Result,
};

const XML_NODE_HEADER_SIZE: u16 = 16;
const NO_INDEX: u32 = 0xFFFF_FFFF;
const ATTRIBUTE_SIZE: usize = 20;
const UNNAMED_TAG: &str = "unnamedTag";

/// Decoder state for one document.
pub(crate) struct AxmlParser<'a> {
    parser: Parser<'a>,
    pool: StringPool<'a>,
    uri_to_prefix: HashMap<String, String>,
    pending_namespaces: Vec<(String, String)>,
    open_namespaces: Vec<(u32, u32)>,
    stack: Vec<XmlElement>,
    document: XmlDocument,
}

impl<'a> AxmlParser<'a> {
    /// Validates the document header and string pool.
    pub(crate) fn new(data: &'a [u8]) -> Result<Self> {
        if data.len() < usize::from(CHUNK_HEADER_SIZE) {
            return Err(invalid_data!(
                0,
                "{} bytes are too few for binary XML",
                data.len()
            ));
        }

        let top = ChunkHeader::read(&mut Parser::new(data))?;
        if top.header_size != CHUNK_HEADER_SIZE {
            return Err(invalid_data!(
                0,
                "document header size {} != {}",
                top.header_size,
                CHUNK_HEADER_SIZE
            ));
        }

        let declared = top.size as usize;
        if declared > data.len() {
            return Err(invalid_data!(
                0,
                "declared size {} exceeds the {} available bytes",
                declared,
                data.len()
            ));
        }
        if declared < data.len() {
            log::warn!(
                "Declared document size {declared} is smaller than the {} available bytes, ignoring the rest",
                data.len()
            );
        }
        if top.chunk_type() != Some(ChunkType::Xml) {
            log::warn!(
                "Unusual document chunk type 0x{:04x}, decoding anyway",
                top.kind
            );
        }

        let mut parser = Parser::new(&data[..declared]);
        parser.seek(top.body())?;
        let pool = StringPool::read(&mut parser)?;
        log::debug!(
            "String pool with {} {} strings",
            pool.len(),
            if pool.is_utf8() { "UTF-8" } else { "UTF-16" }
        );

        Ok(AxmlParser {
            parser,
            pool,
            uri_to_prefix: HashMap::new(),
            pending_namespaces: Vec::new(),
            open_namespaces: Vec::new(),
            stack: Vec::new(),
            document: XmlDocument::default(),
        })
    }

    /// Walks the node chunks and builds the tree.
    pub(crate) fn parse(mut self) -> Result<XmlDocument> {
        while self.parser.remaining() >= usize::from(CHUNK_HEADER_SIZE) {
            let header = ChunkHeader::read(&mut self.parser)?;
            if header.end() > self.parser.len() {
                return Err(invalid_data!(
                    header.start,
                    "chunk of {} bytes runs past the document",
                    header.size
                ));
            }

            match header.chunk_type() {
                Some(ChunkType::XmlResourceMap) => {
                    if header.size % 4 != 0 {
                        return Err(invalid_data!(
                            header.start,
                            "resource map size {} is not a multiple of 4",
                            header.size
                        ));
                    }
                    log::debug!(
                        "Skipping resource map of {} ids",
                        (header.size - u32::from(header.header_size)) / 4
                    );
                }
                Some(
                    kind @ (ChunkType::XmlStartNamespace
                    | ChunkType::XmlEndNamespace
                    | ChunkType::XmlStartElement
                    | ChunkType::XmlEndElement
                    | ChunkType::XmlCData),
                ) => {
                    if header.header_size != XML_NODE_HEADER_SIZE {
                        log::warn!(
                            "{} chunk at 0x{:x} has header size {}, skipping it",
                            kind,
                            header.start,
                            header.header_size
                        );
                    } else {
                        self.node(kind, &header)?;
                    }
                }
                _ => {
                    log::warn!(
                        "Skipping unexpected chunk type 0x{:04x} at 0x{:x} ({} bytes)",
                        header.kind,
                        header.start,
                        header.size
                    );
                }
            }

            self.parser.seek(header.end())?;
        }

        if self.parser.has_more_data() {
            log::warn!(
                "Ignoring {} trailing bytes after the last chunk",
                self.parser.remaining()
            );
        }

        if !self.stack.is_empty() {
            log::warn!("{} elements were never closed", self.stack.len());
            while let Some(element) = self.stack.pop() {
                attach(&mut self.document, &mut self.stack, element);
            }
        }

        Ok(self.document)
    }

    fn node(&mut self, kind: ChunkType, header: &ChunkHeader) -> Result<()> {
        let line = self.parser.read_le::<u32>()?;
        let comment = self.parser.read_le::<u32>()?;
        if comment != NO_INDEX {
            log::warn!("Ignoring comment {comment} on the {kind} chunk at line {line}");
        }

        match kind {
            ChunkType::XmlStartNamespace => self.start_namespace(),
            ChunkType::XmlEndNamespace => self.end_namespace(),
            ChunkType::XmlStartElement => self.start_element(header),
            ChunkType::XmlEndElement => self.end_element(line),
            _ => {
                log::debug!("Skipping CDATA chunk at 0x{:x}", header.start);
                Ok(())
            }
        }
    }

    fn string(&self, index: u32) -> Result<Option<String>> {
        Ok(self.pool.get(index)?.map(str::to_string))
    }

    fn start_namespace(&mut self) -> Result<()> {
        let prefix_index = self.parser.read_le::<u32>()?;
        let uri_index = self.parser.read_le::<u32>()?;
        let prefix = self.string(prefix_index)?.unwrap_or_default();
        let uri = self.string(uri_index)?.unwrap_or_default();

        log::debug!("Namespace '{prefix}' -> '{uri}'");
        if uri.is_empty() {
            log::warn!("Namespace prefix '{prefix}' is bound to an empty URI");
        } else {
            self.uri_to_prefix.insert(uri.clone(), prefix.clone());
        }

        self.open_namespaces.push((prefix_index, uri_index));
        self.pending_namespaces.push((prefix, uri));
        Ok(())
    }

    fn end_namespace(&mut self) -> Result<()> {
        let prefix_index = self.parser.read_le::<u32>()?;
        let uri_index = self.parser.read_le::<u32>()?;

        match self.open_namespaces.pop() {
            Some((open_prefix, open_uri)) => {
                if open_prefix != prefix_index || open_uri != uri_index {
                    log::warn!(
                        "Namespace end ({prefix_index}, {uri_index}) does not match the open namespace ({open_prefix}, {open_uri})"
                    );
                }
            }
            None => log::warn!("Namespace end ({prefix_index}, {uri_index}) without a start"),
        }

        if let Some(uri) = self.string(uri_index)? {
            self.uri_to_prefix.remove(&uri);
            self.pending_namespaces.retain(|(_, pending)| *pending != uri);
        }
        Ok(())
    }

    fn start_element(&mut self, header: &ChunkHeader) -> Result<()> {
        let namespace_index = self.parser.read_le::<u32>()?;
        let name_index = self.parser.read_le::<u32>()?;
        // attribute start and size, always 20 and 20 in practice
        let _flags = self.parser.read_le::<u32>()?;
        let attribute_count = self.parser.read_le::<u32>()? & 0xFFFF;
        let _class_attribute = self.parser.read_le::<u32>()?;

        let name = match self.string(name_index)? {
            Some(name) => name,
            None => {
                log::warn!("Element name index {name_index} is invalid, using '{UNNAMED_TAG}'");
                UNNAMED_TAG.to_string()
            }
        };
        let namespace_uri = self.namespace(namespace_index)?;
        let prefix = namespace_uri
            .as_ref()
            .and_then(|uri| self.uri_to_prefix.get(uri).cloned());

        let mut element = XmlElement {
            name,
            prefix,
            namespace_uri,
            ..XmlElement::default()
        };
        for (prefix, uri) in self.pending_namespaces.drain(..) {
            element.attributes.push(XmlAttribute {
                name: prefix,
                prefix: Some("xmlns".to_string()),
                namespace_uri: None,
                value: uri,
            });
        }

        let table_end = self.parser.pos() + attribute_count as usize * ATTRIBUTE_SIZE;
        if table_end > header.end() {
            return Err(invalid_data!(
                header.start,
                "{} attributes run past the element chunk ending at 0x{:x}",
                attribute_count,
                header.end()
            ));
        }
        for _ in 0..attribute_count {
            if let Some(attribute) = self.attribute()? {
                element.attributes.push(attribute);
            }
        }

        self.stack.push(element);
        Ok(())
    }

    fn namespace(&self, index: u32) -> Result<Option<String>> {
        if index == NO_INDEX {
            return Ok(None);
        }
        Ok(self.string(index)?.filter(|uri| !uri.is_empty()))
    }

    fn attribute(&mut self) -> Result<Option<XmlAttribute>> {
        let offset = self.parser.pos();
        let namespace_index = self.parser.read_le::<u32>()?;
        let name_index = self.parser.read_le::<u32>()?;
        let _raw_value = self.parser.read_le::<u32>()?;
        let value_type = (self.parser.read_le::<u32>()? >> 24) as u8;
        let data = self.parser.read_le::<u32>()?;

        let name = match self.string(name_index)? {
            Some(name) if !name.is_empty() => name,
            _ => {
                log::warn!("Skipping attribute without a name at 0x{offset:x}");
                return Ok(None);
            }
        };

        let namespace_uri = self.namespace(namespace_index)?;
        let prefix = namespace_uri
            .as_ref()
            .and_then(|uri| self.uri_to_prefix.get(uri).cloned());

        let string = if value_type == ValueType::String as u8 {
            self.string(data)?
        } else {
            None
        };
        let value = format_value(value_type, data, |_| string);

        Ok(Some(XmlAttribute {
            name,
            prefix,
            namespace_uri,
            value,
        }))
    }

    fn end_element(&mut self, line: u32) -> Result<()> {
        let _namespace_index = self.parser.read_le::<u32>()?;
        let _name_index = self.parser.read_le::<u32>()?;

        match self.stack.pop() {
            Some(element) => attach(&mut self.document, &mut self.stack, element),
            None => log::warn!("Element end at line {line} without an open element"),
        }
        Ok(())
    }
}
