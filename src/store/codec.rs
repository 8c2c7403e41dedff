//! Node tree <-> block encoding.
//!
//! Every named node is written as one group block:
//!
//! ```text
//! [0] data   kind tag (u8) + UTF-8 name
//! [1] data   attribute map (empty block when there are none)
//! group:     [2..] one group block per child node
//! bytes:     [2]   payload
//! array:     [2]   element type (u8), compressed (u8), rank (u32), extents (u64 each)
//!            [3]   element bytes, zlib-compressed when flagged
//! ```
//!
//! Children are written before their parent, so the root group is the last
//! block in the file and its position goes into the header.

use std::io::{Cursor, Read};
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::array::Array;
use super::attr::{AttrValue, Attributes};
use super::compression::{compress, decompress};
use super::format::*;
use super::node::{Dataset, Group, Node, Payload};
use super::reader::{IGroup, IStreams};
use super::stream::OStream;
use crate::util::{Dimensions, Error, PlainOldDataType, Result};

/// Deepest nesting accepted when reading.
const MAX_DEPTH: usize = 256;

const ATTR_BOOL: u8 = 0;
const ATTR_INT: u8 = 1;
const ATTR_FLOAT: u8 = 2;
const ATTR_TEXT: u8 = 3;
const ATTR_BYTES: u8 = 4;

/// Write `node` and its subtree; returns the node's group offset.
pub fn write_node(stream: &mut OStream, name: &str, node: &Node, level: i32) -> Result<u64> {
    let mut header = Vec::with_capacity(1 + name.len());
    let mut children = Vec::new();

    match node {
        Node::Group(group) => {
            header.push(NODE_GROUP);
            header.extend_from_slice(name.as_bytes());
            for (child_name, child) in group.children() {
                children.push(write_node(stream, child_name, child, level)?);
            }
        }
        Node::Dataset(dataset) => match &dataset.payload {
            Payload::Bytes(bytes) => {
                header.push(NODE_BYTES);
                header.extend_from_slice(name.as_bytes());
                children.push(stream.write_data(bytes)?);
            }
            Payload::Array { array, compressed } => {
                header.push(NODE_ARRAY);
                header.extend_from_slice(name.as_bytes());
                children.push(stream.write_data(&encode_array_header(array, *compressed)?)?);
                let payload = if *compressed {
                    compress(array.raw_bytes(), level)?
                } else {
                    array.raw_bytes().to_vec()
                };
                children.push(stream.write_data(&payload)?);
            }
        },
    }

    let header_pos = stream.write_data(&header)?;
    let attrs_pos = stream.write_data(&encode_attrs(node.attrs())?)?;
    let mut all = Vec::with_capacity(children.len() + 2);
    all.push(header_pos);
    all.push(attrs_pos);
    all.extend(children);
    stream.write_group(&all)
}

/// Read the whole tree under the root group position.
pub fn read_root(streams: Arc<IStreams>, root_pos: u64) -> Result<Group> {
    let group = IGroup::new(streams, root_pos)?;
    let (_, node) = read_node(&group, 0)?;
    match node {
        Node::Group(root) => Ok(root),
        Node::Dataset(_) => Err(Error::invalid("root node is a dataset")),
    }
}

fn read_node(group: &IGroup, depth: usize) -> Result<(String, Node)> {
    if depth > MAX_DEPTH {
        return Err(Error::invalid(format!("nesting deeper than {}", MAX_DEPTH)));
    }
    if group.num_children() < 2 {
        return Err(Error::invalid(format!(
            "node at {} has {} blocks, expected at least 2",
            group.pos(),
            group.num_children()
        )));
    }

    let header = group.data(0)?.read_all()?;
    let (&kind, name) = header
        .split_first()
        .ok_or_else(|| Error::invalid(format!("node at {} has an empty header", group.pos())))?;
    let name = String::from_utf8(name.to_vec())?;
    let attrs = decode_attrs(&group.data(1)?.read_all()?)?;

    let node = match kind {
        NODE_GROUP => {
            let mut out = Group::new();
            *out.attrs_mut() = attrs;
            for index in 2..group.num_children() {
                if !group.is_child_group(index)? {
                    return Err(Error::invalid(format!("group {:?} holds a bare data block", name)));
                }
                let (child_name, child) = read_node(&group.group(index)?, depth + 1)?;
                out.insert_node(child_name, child);
            }
            Node::Group(out)
        }
        NODE_BYTES => {
            expect_blocks(group, &name, 3)?;
            Node::Dataset(Dataset::bytes(group.data(2)?.read_all()?).with_attrs(attrs))
        }
        NODE_ARRAY => {
            expect_blocks(group, &name, 4)?;
            let (pod, dims, compressed) = decode_array_header(&group.data(2)?.read_all()?)?;
            let raw = group.data(3)?.read_all()?;
            let data = if compressed { decompress(&raw)? } else { raw };
            let array = Array::from_raw(pod, dims, data)?;
            Node::Dataset(Dataset::array(array, compressed).with_attrs(attrs))
        }
        other => {
            return Err(Error::invalid(format!("node {:?} has unknown kind {}", name, other)));
        }
    };
    Ok((name, node))
}

fn expect_blocks(group: &IGroup, name: &str, count: usize) -> Result<()> {
    if group.num_children() != count {
        return Err(Error::invalid(format!(
            "dataset {:?} has {} blocks, expected {}",
            name,
            group.num_children(),
            count
        )));
    }
    Ok(())
}

fn encode_array_header(array: &Array, compressed: bool) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(6 + 8 * array.dims().rank());
    buf.write_u8(array.pod() as u8)?;
    buf.write_u8(compressed as u8)?;
    buf.write_u32::<LittleEndian>(array.dims().rank() as u32)?;
    for &extent in array.shape() {
        buf.write_u64::<LittleEndian>(extent as u64)?;
    }
    Ok(buf)
}

fn decode_array_header(bytes: &[u8]) -> Result<(PlainOldDataType, Dimensions, bool)> {
    let mut cur = Cursor::new(bytes);
    let truncated = |_| Error::corrupt("array header truncated");

    let tag = cur.read_u8().map_err(truncated)?;
    let pod = PlainOldDataType::from_u8(tag)
        .ok_or_else(|| Error::corrupt(format!("unknown element type tag {}", tag)))?;
    let compressed = cur.read_u8().map_err(truncated)? != 0;
    let rank = cur.read_u32::<LittleEndian>().map_err(truncated)? as usize;
    if rank * 8 > bytes.len() {
        return Err(Error::corrupt(format!("array header claims rank {}", rank)));
    }
    let mut extents = Vec::with_capacity(rank);
    for _ in 0..rank {
        let extent = cur.read_u64::<LittleEndian>().map_err(truncated)?;
        extents.push(usize::try_from(extent).map_err(|_| Error::corrupt("array extent overflows usize"))?);
    }
    let dims = Dimensions::from(extents);
    if dims.checked_num_elements().is_none() {
        return Err(Error::corrupt(format!("array shape {} overflows", dims)));
    }
    Ok((pod, dims, compressed))
}

/// Binary attribute map: count (u32), then per entry key length (u32), key,
/// type tag (u8) and value.
fn encode_attrs(attrs: &Attributes) -> Result<Vec<u8>> {
    if attrs.is_empty() {
        return Ok(Vec::new());
    }
    let mut buf = Vec::new();
    buf.write_u32::<LittleEndian>(attrs.len() as u32)?;
    for (key, value) in attrs {
        write_sized(&mut buf, key.as_bytes())?;
        match value {
            AttrValue::Bool(v) => {
                buf.write_u8(ATTR_BOOL)?;
                buf.write_u8(*v as u8)?;
            }
            AttrValue::Int(v) => {
                buf.write_u8(ATTR_INT)?;
                buf.write_i64::<LittleEndian>(*v)?;
            }
            AttrValue::Float(v) => {
                buf.write_u8(ATTR_FLOAT)?;
                buf.write_f64::<LittleEndian>(*v)?;
            }
            AttrValue::Text(v) => {
                buf.write_u8(ATTR_TEXT)?;
                write_sized(&mut buf, v.as_bytes())?;
            }
            AttrValue::Bytes(v) => {
                buf.write_u8(ATTR_BYTES)?;
                write_sized(&mut buf, v)?;
            }
        }
    }
    Ok(buf)
}

fn decode_attrs(bytes: &[u8]) -> Result<Attributes> {
    let mut attrs = Attributes::new();
    if bytes.is_empty() {
        return Ok(attrs);
    }
    let mut cur = Cursor::new(bytes);
    let truncated = |_| Error::corrupt("attribute map truncated");

    let count = cur.read_u32::<LittleEndian>().map_err(truncated)?;
    for _ in 0..count {
        let key = String::from_utf8(read_sized(&mut cur)?)?;
        let value = match cur.read_u8().map_err(truncated)? {
            ATTR_BOOL => AttrValue::Bool(cur.read_u8().map_err(truncated)? != 0),
            ATTR_INT => AttrValue::Int(cur.read_i64::<LittleEndian>().map_err(truncated)?),
            ATTR_FLOAT => AttrValue::Float(cur.read_f64::<LittleEndian>().map_err(truncated)?),
            ATTR_TEXT => AttrValue::Text(String::from_utf8(read_sized(&mut cur)?)?),
            ATTR_BYTES => AttrValue::Bytes(read_sized(&mut cur)?),
            other => return Err(Error::corrupt(format!("unknown attribute tag {}", other))),
        };
        attrs.insert(key, value);
    }
    Ok(attrs)
}

fn write_sized(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    buf.write_u32::<LittleEndian>(bytes.len() as u32)?;
    buf.extend_from_slice(bytes);
    Ok(())
}

fn read_sized(cur: &mut Cursor<&[u8]>) -> Result<Vec<u8>> {
    let len = cur
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::corrupt("attribute map truncated"))? as usize;
    let remaining = cur.get_ref().len() - cur.position() as usize;
    if len > remaining {
        return Err(Error::corrupt("attribute map truncated"));
    }
    let mut out = vec![0u8; len];
    cur.read_exact(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array_header(pod: PlainOldDataType, extents: &[u64]) -> Vec<u8> {
        let mut buf = vec![pod as u8, 0];
        buf.write_u32::<LittleEndian>(extents.len() as u32).unwrap();
        for &extent in extents {
            buf.write_u64::<LittleEndian>(extent).unwrap();
        }
        buf
    }

    #[test]
    fn test_array_header_rejects_overflowing_extents() {
        let header = array_header(PlainOldDataType::Float64, &[1 << 62, 8]);
        assert!(matches!(decode_array_header(&header), Err(Error::Corrupt(_))));

        let header = array_header(PlainOldDataType::Float64, &[180, 360]);
        let (pod, dims, compressed) = decode_array_header(&header).unwrap();
        assert_eq!(pod, PlainOldDataType::Float64);
        assert_eq!(dims, Dimensions::d2(180, 360));
        assert!(!compressed);
    }

    #[test]
    fn test_attrs_roundtrip_keeps_nan_bits() {
        let attrs = crate::attrs! {
            "units" => "g",
            "digits" => 4i64,
            "fill" => f64::NAN,
            "flag" => true,
            "raw" => vec![0u8, 255],
        };
        let back = decode_attrs(&encode_attrs(&attrs).unwrap()).unwrap();
        assert_eq!(back.len(), 5);
        assert_eq!(back["units"], AttrValue::from("g"));
        assert_eq!(back["digits"], AttrValue::Int(4));
        assert!(matches!(back["fill"], AttrValue::Float(v) if v.is_nan()));
        assert_eq!(back["raw"], AttrValue::Bytes(vec![0, 255]));
    }

    #[test]
    fn test_empty_attrs_encode_to_nothing() {
        assert!(encode_attrs(&Attributes::new()).unwrap().is_empty());
        assert!(decode_attrs(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_attrs() {
        let attrs = crate::attrs! { "units" => "cm/s" };
        let bytes = encode_attrs(&attrs).unwrap();
        let err = decode_attrs(&bytes[..bytes.len() - 2]).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn test_array_header_roundtrip() {
        let array = Array::from_vec((2, 2), vec![1i16, 2, 3, 4]).unwrap();
        let header = encode_array_header(&array, true).unwrap();
        let (pod, dims, compressed) = decode_array_header(&header).unwrap();
        assert_eq!(pod, PlainOldDataType::Int16);
        assert_eq!(dims.sizes(), &[2, 2]);
        assert!(compressed);

        assert!(matches!(decode_array_header(&[99]), Err(Error::Corrupt(_))));
    }
}
