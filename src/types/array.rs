//! Lists and PostgreSQL arrays.
//!
//! A list dumper does not know its element type by itself: the transformer
//! attaches an element dumper with [`Dumper::set_sub_dumper`] before it
//! hands the list dumper out. Array loaders resolve their element loader
//! from the context they are built in.

use super::{unexpected, utf8};
use crate::adapt::{
    AdaptContext, AdaptersMap, Dumped, Dumper, Loader, NewDumper, NewLoader, dumper_factory,
    loader_factory,
};
use crate::error::{AdaptError, AdaptResult};
use crate::protocol::types::known_oids;
use crate::protocol::{Format, Oid, array_oid_of, element_oid_of, is_array_oid, oid};
use crate::value::{List, MAX_LIST_DEPTH, Value, ValueType};
use bytes::{Buf, BufMut, BytesMut};
use std::rc::Rc;

pub(super) fn register(map: &AdaptersMap) {
    map.register_dumper(ValueType::List, Format::Text, dumper_factory::<ListDumper>());
    map.register_dumper(ValueType::List, Format::Binary, dumper_factory::<ListBinaryDumper>());
    for oid in known_oids().filter(|oid| is_array_oid(*oid)) {
        map.register_loader(oid, Format::Text, loader_factory::<ArrayLoader>());
        map.register_loader(oid, Format::Binary, loader_factory::<ArrayBinaryLoader>());
    }
}

fn list_of(value: &Value) -> AdaptResult<&List> {
    match value {
        Value::List(list) => Ok(list),
        other => Err(unexpected(ValueType::List, other)),
    }
}

fn sub_dumper(sub: &Option<Rc<dyn Dumper>>) -> AdaptResult<&dyn Dumper> {
    sub.as_deref()
        .ok_or_else(|| AdaptError::Data("list dumper has no element dumper".to_string()))
}

fn enter(path: &mut Vec<usize>, list: &List) -> AdaptResult<()> {
    if path.contains(&list.id()) {
        return Err(AdaptError::RecursiveList);
    }
    if path.len() >= MAX_LIST_DEPTH {
        return Err(too_deep());
    }
    path.push(list.id());
    Ok(())
}

fn too_deep() -> AdaptError {
    AdaptError::Data(format!("lists nested deeper than {} levels", MAX_LIST_DEPTH))
}

// ==================== Text arrays ====================

/// Dumps nested lists as `{a,b,{c,d}}` literals.
pub struct ListDumper {
    src: ValueType,
    sub: Option<Rc<dyn Dumper>>,
}

impl NewDumper for ListDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src, sub: None }
    }
}

impl Dumper for ListDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        match self.sub.as_ref().map(|sub| sub.oid()) {
            None | Some(oid::INVALID) => oid::TEXT_ARRAY,
            Some(elem) => array_oid_of(elem).unwrap_or(oid::INVALID),
        }
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        let list = list_of(value)?;
        let sub = sub_dumper(&self.sub)?;
        let mut buf = BytesMut::new();
        dump_text(sub, list, &mut Vec::new(), &mut buf)?;
        Ok(Dumped::new(buf.freeze()))
    }

    fn set_sub_dumper(&mut self, sub: Rc<dyn Dumper>) {
        self.sub = Some(sub);
    }
}

fn dump_text(
    sub: &dyn Dumper,
    list: &List,
    path: &mut Vec<usize>,
    buf: &mut BytesMut,
) -> AdaptResult<()> {
    enter(path, list)?;
    buf.put_u8(b'{');
    for (i, item) in list.items().iter().enumerate() {
        if i > 0 {
            buf.put_u8(b',');
        }
        match item {
            Value::Null => buf.put_slice(b"NULL"),
            Value::List(inner) => dump_text(sub, inner, path, buf)?,
            other => put_element(&sub.dump(other)?.data, buf),
        }
    }
    buf.put_u8(b'}');
    path.pop();
    Ok(())
}

fn needs_quotes(data: &[u8]) -> bool {
    data.is_empty()
        || data.eq_ignore_ascii_case(b"NULL")
        || data
            .iter()
            .any(|b| matches!(b, b'{' | b'}' | b',' | b'"' | b'\\') || b.is_ascii_whitespace())
}

fn put_element(data: &[u8], buf: &mut BytesMut) {
    if !needs_quotes(data) {
        buf.put_slice(data);
        return;
    }
    buf.put_u8(b'"');
    for &b in data {
        if b == b'"' || b == b'\\' {
            buf.put_u8(b'\\');
        }
        buf.put_u8(b);
    }
    buf.put_u8(b'"');
}

// ==================== Binary arrays ====================

/// Dumps rectangular nested lists in the binary array format.
pub struct ListBinaryDumper {
    src: ValueType,
    sub: Option<Rc<dyn Dumper>>,
}

impl NewDumper for ListBinaryDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src, sub: None }
    }
}

impl Dumper for ListBinaryDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        self.sub
            .as_ref()
            .and_then(|sub| array_oid_of(element_oid(sub.as_ref())))
            .unwrap_or(oid::INVALID)
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        let list = list_of(value)?;
        let sub = sub_dumper(&self.sub)?;
        let dims = dimensions(list)?;

        let mut buf = BytesMut::new();
        if dims.contains(&0) {
            // Empty arrays have no dimensions at all.
            buf.put_i32(0);
            buf.put_i32(0);
            buf.put_u32(element_oid(sub));
            return Ok(Dumped::new(buf.freeze()));
        }

        buf.put_i32(dims.len() as i32);
        buf.put_i32(0); // has-null flag, patched below
        buf.put_u32(element_oid(sub));
        for dim in &dims {
            buf.put_i32(*dim as i32);
            buf.put_i32(1); // lower bound
        }

        let mut has_null = false;
        dump_binary(sub, list, &dims, &mut Vec::new(), &mut has_null, &mut buf)?;
        if has_null {
            buf[4..8].copy_from_slice(&1i32.to_be_bytes());
        }
        Ok(Dumped::new(buf.freeze()))
    }

    fn set_sub_dumper(&mut self, sub: Rc<dyn Dumper>) {
        self.sub = Some(sub);
    }
}

fn element_oid(sub: &dyn Dumper) -> Oid {
    match sub.oid() {
        oid::INVALID => oid::TEXT,
        elem => elem,
    }
}

/// Lengths of each nesting level, following the first element down.
fn dimensions(list: &List) -> AdaptResult<Vec<usize>> {
    let mut dims = Vec::new();
    let mut path = Vec::new();
    let mut current = list.clone();
    loop {
        enter(&mut path, &current)?;
        dims.push(current.len());
        let next = match current.items().first() {
            Some(Value::List(inner)) => inner.clone(),
            _ => break,
        };
        current = next;
    }
    if dims.len() > 6 {
        return Err(AdaptError::Data(format!(
            "arrays can have at most 6 dimensions, got {}",
            dims.len()
        )));
    }
    Ok(dims)
}

fn dump_binary(
    sub: &dyn Dumper,
    list: &List,
    dims: &[usize],
    path: &mut Vec<usize>,
    has_null: &mut bool,
    buf: &mut BytesMut,
) -> AdaptResult<()> {
    enter(path, list)?;
    let (len, rest) = dims
        .split_first()
        .ok_or_else(|| AdaptError::Data("nested lists must have the same depth".to_string()))?;
    let items = list.items();
    if items.len() != *len {
        return Err(AdaptError::Data(
            "nested lists must have the same length at each level".to_string(),
        ));
    }

    for item in items.iter() {
        match item {
            Value::List(inner) if !rest.is_empty() => {
                dump_binary(sub, inner, rest, path, has_null, buf)?
            }
            _ if !rest.is_empty() => {
                return Err(AdaptError::Data(
                    "nested lists must have the same depth".to_string(),
                ));
            }
            Value::List(_) => {
                return Err(AdaptError::Data(
                    "nested lists must have the same depth".to_string(),
                ));
            }
            Value::Null => {
                *has_null = true;
                buf.put_i32(-1);
            }
            other => {
                let dumped = sub.dump(other)?;
                let len = i32::try_from(dumped.data.len())
                    .map_err(|_| AdaptError::Data("array element too large".to_string()))?;
                buf.put_i32(len);
                buf.put_slice(&dumped.data);
            }
        }
    }
    path.pop();
    Ok(())
}

// ==================== Loaders ====================

fn element_loader(
    array: Oid,
    format: Format,
    context: &dyn AdaptContext,
) -> Option<Box<dyn Loader>> {
    let elem = element_oid_of(array)?;
    let adapters = context.adapters();
    let factory = adapters
        .get_loader(elem, format)
        .or_else(|| adapters.get_loader(oid::INVALID, format))?;
    Some(factory(elem, context))
}

fn load_element(element: &Option<Box<dyn Loader>>, data: &[u8], format: Format) -> AdaptResult<Value> {
    match (element, format) {
        (Some(loader), _) => loader.load(data),
        (None, Format::Text) => Ok(Value::String(utf8(data)?.to_string())),
        (None, Format::Binary) => Ok(Value::Bytes(data.to_vec())),
    }
}

/// Text arrays such as `{1,2,NULL}` or `{{"a b",c},{d,e}}`.
pub struct ArrayLoader {
    oid: Oid,
    element: Option<Box<dyn Loader>>,
}

impl NewLoader for ArrayLoader {
    fn new(oid: Oid, context: &dyn AdaptContext) -> Self {
        Self {
            oid,
            element: element_loader(oid, Format::Text, context),
        }
    }
}

impl Loader for ArrayLoader {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn load(&self, data: &[u8]) -> AdaptResult<Value> {
        let mut data = data;
        // Skip a dimension decoration like [0:2]={...}
        if data.first() == Some(&b'[') {
            let eq = data
                .iter()
                .position(|&b| b == b'=')
                .ok_or_else(|| AdaptError::Data("Invalid array dimensions".to_string()))?;
            data = &data[eq + 1..];
        }

        let mut parser = TextArrayParser {
            data,
            pos: 0,
            depth: 0,
            element: &self.element,
        };
        let value = parser.parse_list()?;
        if parser.pos != data.len() {
            return Err(AdaptError::Data("Trailing data after array".to_string()));
        }
        Ok(value)
    }
}

struct TextArrayParser<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
    element: &'a Option<Box<dyn Loader>>,
}

impl TextArrayParser<'_> {
    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn expect(&mut self, c: u8) -> AdaptResult<()> {
        if self.peek() != Some(c) {
            return Err(AdaptError::Data(format!(
                "Invalid array: expected '{}' at position {}",
                c as char, self.pos
            )));
        }
        self.pos += 1;
        Ok(())
    }

    fn parse_list(&mut self) -> AdaptResult<Value> {
        if self.depth == MAX_LIST_DEPTH {
            return Err(too_deep());
        }
        self.expect(b'{')?;
        self.depth += 1;
        let mut items = Vec::new();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            self.depth -= 1;
            return Ok(Value::list(items));
        }

        loop {
            let item = match self.peek() {
                Some(b'{') => self.parse_list()?,
                Some(b'"') => {
                    let raw = self.parse_quoted()?;
                    load_element(self.element, &raw, Format::Text)?
                }
                Some(_) => self.parse_unquoted()?,
                None => return Err(AdaptError::Data("Unterminated array".to_string())),
            };
            items.push(item);

            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    self.depth -= 1;
                    return Ok(Value::list(items));
                }
                _ => return Err(AdaptError::Data("Unterminated array".to_string())),
            }
        }
    }

    fn parse_quoted(&mut self) -> AdaptResult<Vec<u8>> {
        self.expect(b'"')?;
        let mut out = Vec::new();
        loop {
            match self.peek() {
                Some(b'\\') => {
                    let c = self
                        .data
                        .get(self.pos + 1)
                        .ok_or_else(|| AdaptError::Data("Unterminated array".to_string()))?;
                    out.push(*c);
                    self.pos += 2;
                }
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
                None => return Err(AdaptError::Data("Unterminated quoted element".to_string())),
            }
        }
    }

    fn parse_unquoted(&mut self) -> AdaptResult<Value> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == b',' || c == b'}' {
                break;
            }
            self.pos += 1;
        }
        let raw = self.data[start..self.pos].trim_ascii();
        if raw.eq_ignore_ascii_case(b"NULL") {
            return Ok(Value::Null);
        }
        load_element(self.element, raw, Format::Text)
    }
}

/// Binary arrays of any dimension.
pub struct ArrayBinaryLoader {
    oid: Oid,
    element: Option<Box<dyn Loader>>,
}

impl NewLoader for ArrayBinaryLoader {
    fn new(oid: Oid, context: &dyn AdaptContext) -> Self {
        Self {
            oid,
            element: element_loader(oid, Format::Binary, context),
        }
    }
}

impl Loader for ArrayBinaryLoader {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn load(&self, data: &[u8]) -> AdaptResult<Value> {
        let truncated = || AdaptError::Data("Binary array truncated".to_string());
        let mut buf = data;
        if buf.remaining() < 12 {
            return Err(truncated());
        }

        let ndim = buf.get_i32();
        let _has_null = buf.get_i32();
        let elem_oid = buf.get_u32();
        if !(0..=6).contains(&ndim) {
            return Err(AdaptError::Data(format!("Invalid array dimensions: {}", ndim)));
        }
        if let Some(expected) = element_oid_of(self.oid) {
            if expected != elem_oid {
                return Err(AdaptError::Data(format!(
                    "Array of oid {} expected for {}, got elements of oid {}",
                    expected, self.oid, elem_oid
                )));
            }
        }
        if ndim == 0 {
            return Ok(Value::list(Vec::new()));
        }

        if buf.remaining() < ndim as usize * 8 {
            return Err(truncated());
        }
        let mut dims = Vec::with_capacity(ndim as usize);
        for _ in 0..ndim {
            let len = buf.get_i32();
            let _lower_bound = buf.get_i32();
            let len = usize::try_from(len)
                .map_err(|_| AdaptError::Data("Negative array dimension".to_string()))?;
            dims.push(len);
        }

        let value = self.read_level(&mut buf, &dims)?;
        if buf.has_remaining() {
            return Err(AdaptError::Data("Trailing data after array".to_string()));
        }
        Ok(value)
    }
}

impl ArrayBinaryLoader {
    fn read_level(&self, buf: &mut &[u8], dims: &[usize]) -> AdaptResult<Value> {
        let truncated = || AdaptError::Data("Binary array truncated".to_string());
        let Some((len, rest)) = dims.split_first() else {
            return Err(truncated());
        };

        let mut items = Vec::with_capacity((*len).min(1024));
        for _ in 0..*len {
            if !rest.is_empty() {
                items.push(self.read_level(buf, rest)?);
                continue;
            }
            if buf.remaining() < 4 {
                return Err(truncated());
            }
            let size = buf.get_i32();
            if size == -1 {
                items.push(Value::Null);
                continue;
            }
            let size = usize::try_from(size).map_err(|_| truncated())?;
            if buf.remaining() < size {
                return Err(truncated());
            }
            let data: &[u8] = *buf;
            let (head, tail) = data.split_at(size);
            *buf = tail;
            items.push(load_element(&self.element, head, Format::Binary)?);
        }
        Ok(Value::list(items))
    }
}
