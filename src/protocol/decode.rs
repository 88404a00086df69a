//! Protocol message decoding (Thrift strict binary)
//!
//! The binary protocol carries no outer length, so the decoders work on
//! whatever bytes have arrived so far. Running out of input is reported as
//! `io::ErrorKind::UnexpectedEof`, which callers treat as "read more and
//! retry"; every other error kind means the stream is corrupt.

use super::constants::{
    message_type, ttype, MAX_CONTAINER_SIZE, MAX_SKIP_DEPTH, MAX_STRING_LENGTH, TYPE_MASK,
    VERSION_1, VERSION_MASK,
};
use super::message::{
    ApplicationException, BeeswaxException, Call, CallEnvelope, Method, Query, QueryHandle,
    QueryState, RemoteError, Reply, ReplyEnvelope, Results, TStatus,
};
use std::io;

/// Decode one reply from the front of `data`
///
/// # Returns
/// `Ok((reply, consumed))` - Reply and number of bytes consumed
/// `Err(e)` - `UnexpectedEof` if the reply is incomplete, `InvalidData` if malformed
pub fn decode_reply(data: &[u8]) -> io::Result<(ReplyEnvelope, usize)> {
    let mut r = Reader::new(data);
    let (name, kind, seqid) = r.read_message_begin()?;
    let method = Method::from_name(&name)
        .ok_or_else(|| invalid(format!("reply for unknown method '{}'", name)))?;

    let outcome = match kind {
        message_type::REPLY => read_result(&mut r, method)?,
        message_type::EXCEPTION => Err(RemoteError::Application(
            read_application_exception(&mut r)?,
        )),
        other => return Err(invalid(format!("unexpected message type {} in reply", other))),
    };

    Ok((
        ReplyEnvelope {
            method,
            seqid,
            outcome,
        },
        r.pos,
    ))
}

/// Decode one call from the front of `data`
pub fn decode_call(data: &[u8]) -> io::Result<(CallEnvelope, usize)> {
    let mut r = Reader::new(data);
    let (name, kind, seqid) = r.read_message_begin()?;
    if kind != message_type::CALL {
        return Err(invalid(format!("expected CALL message, got type {}", kind)));
    }
    let method = Method::from_name(&name)
        .ok_or_else(|| invalid(format!("call to unknown method '{}'", name)))?;

    let mut query = None;
    let mut handle = None;
    let mut start_over = false;
    let mut fetch_size = -1;
    let mut context = None;

    loop {
        let (field_type, id) = r.read_field_begin()?;
        if field_type == ttype::STOP {
            break;
        }
        match (method, id, field_type) {
            (Method::Query, 1, ttype::STRUCT) => query = Some(read_query(&mut r)?),
            (
                Method::GetState | Method::Fetch | Method::Close | Method::Cancel,
                1,
                ttype::STRUCT,
            ) => handle = Some(read_query_handle(&mut r)?),
            (Method::Fetch, 2, ttype::BOOL) => start_over = r.read_bool()?,
            (Method::Fetch, 3, ttype::I32) => fetch_size = r.read_i32()?,
            (Method::GetLog, 1, ttype::STRING) => context = Some(r.read_string()?),
            _ => r.skip(field_type, 0)?,
        }
    }

    let missing = || invalid(format!("{} call is missing its arguments", method));
    let call = match method {
        Method::Query => Call::Query(query.ok_or_else(missing)?),
        Method::GetState => Call::GetState(handle.ok_or_else(missing)?),
        Method::Fetch => Call::Fetch {
            handle: handle.ok_or_else(missing)?,
            start_over,
            fetch_size,
        },
        Method::Close => Call::Close(handle.ok_or_else(missing)?),
        Method::GetLog => Call::GetLog(context.ok_or_else(missing)?),
        Method::Cancel => Call::Cancel(handle.ok_or_else(missing)?),
    };

    Ok((CallEnvelope { seqid, call }, r.pos))
}

fn read_result(r: &mut Reader<'_>, method: Method) -> io::Result<Result<Reply, RemoteError>> {
    let mut success = None;
    let mut failure = None;

    loop {
        let (field_type, id) = r.read_field_begin()?;
        if field_type == ttype::STOP {
            break;
        }
        match (method, id, field_type) {
            (Method::Query, 0, ttype::STRUCT) => {
                success = Some(Reply::Query(read_query_handle(r)?));
            }
            (Method::GetState, 0, ttype::I32) => {
                let value = r.read_i32()?;
                let state = QueryState::from_i32(value)
                    .ok_or_else(|| invalid(format!("unknown query state {}", value)))?;
                success = Some(Reply::GetState(state));
            }
            (Method::Fetch, 0, ttype::STRUCT) => success = Some(Reply::Fetch(read_results(r)?)),
            (Method::GetLog, 0, ttype::STRING) => success = Some(Reply::GetLog(r.read_string()?)),
            (Method::Cancel, 0, ttype::STRUCT) => success = Some(Reply::Cancel(read_status(r)?)),
            (
                Method::GetState | Method::Fetch | Method::Close | Method::GetLog,
                1,
                ttype::STRUCT,
            ) => {
                r.skip(ttype::STRUCT, 0)?;
                failure = Some(RemoteError::QueryNotFound);
            }
            (Method::Query | Method::Cancel, 1, ttype::STRUCT)
            | (Method::Fetch | Method::Close, 2, ttype::STRUCT) => {
                failure = Some(RemoteError::Beeswax(read_beeswax_exception(r)?));
            }
            _ => r.skip(field_type, 0)?,
        }
    }

    match (failure, success) {
        (Some(err), _) => Ok(Err(err)),
        (None, Some(reply)) => Ok(Ok(reply)),
        (None, None) if method == Method::Close => Ok(Ok(Reply::Close)),
        (None, None) => Err(invalid(format!("{} reply carried no result", method))),
    }
}

fn read_query(r: &mut Reader<'_>) -> io::Result<Query> {
    let mut query = Query::default();
    loop {
        let (field_type, id) = r.read_field_begin()?;
        match (id, field_type) {
            (_, ttype::STOP) => break,
            (1, ttype::STRING) => query.query = r.read_string()?,
            (3, ttype::LIST) => query.configuration = r.read_string_list()?,
            (4, ttype::STRING) => query.hadoop_user = Some(r.read_string()?),
            _ => r.skip(field_type, 0)?,
        }
    }
    Ok(query)
}

fn read_query_handle(r: &mut Reader<'_>) -> io::Result<QueryHandle> {
    let mut handle = QueryHandle::default();
    loop {
        let (field_type, id) = r.read_field_begin()?;
        match (id, field_type) {
            (_, ttype::STOP) => break,
            (1, ttype::STRING) => handle.id = r.read_string()?,
            (2, ttype::STRING) => handle.log_context = r.read_string()?,
            _ => r.skip(field_type, 0)?,
        }
    }
    Ok(handle)
}

fn read_results(r: &mut Reader<'_>) -> io::Result<Results> {
    let mut results = Results::default();
    loop {
        let (field_type, id) = r.read_field_begin()?;
        match (id, field_type) {
            (_, ttype::STOP) => break,
            (1, ttype::BOOL) => results.ready = r.read_bool()?,
            (2, ttype::LIST) => results.columns = r.read_string_list()?,
            (3, ttype::LIST) => results.data = r.read_string_list()?,
            (4, ttype::I64) => results.start_row = r.read_i64()?,
            (5, ttype::BOOL) => results.has_more = r.read_bool()?,
            _ => r.skip(field_type, 0)?,
        }
    }
    Ok(results)
}

fn read_status(r: &mut Reader<'_>) -> io::Result<TStatus> {
    let mut status = TStatus::default();
    loop {
        let (field_type, id) = r.read_field_begin()?;
        match (id, field_type) {
            (_, ttype::STOP) => break,
            (1, ttype::I32) => status.status_code = r.read_i32()?,
            (2, ttype::LIST) => status.error_msgs = r.read_string_list()?,
            _ => r.skip(field_type, 0)?,
        }
    }
    Ok(status)
}

fn read_beeswax_exception(r: &mut Reader<'_>) -> io::Result<BeeswaxException> {
    let mut exc = BeeswaxException::default();
    loop {
        let (field_type, id) = r.read_field_begin()?;
        match (id, field_type) {
            (_, ttype::STOP) => break,
            (1, ttype::STRING) => exc.message = r.read_string()?,
            (2, ttype::STRING) => exc.log_context = r.read_string()?,
            (3, ttype::STRUCT) => exc.handle = Some(read_query_handle(r)?),
            (4, ttype::I32) => exc.error_code = Some(r.read_i32()?),
            (5, ttype::STRING) => exc.sql_state = Some(r.read_string()?),
            _ => r.skip(field_type, 0)?,
        }
    }
    Ok(exc)
}

fn read_application_exception(r: &mut Reader<'_>) -> io::Result<ApplicationException> {
    let mut exc = ApplicationException::default();
    loop {
        let (field_type, id) = r.read_field_begin()?;
        match (id, field_type) {
            (_, ttype::STOP) => break,
            (1, ttype::STRING) => exc.message = r.read_string()?,
            (2, ttype::I32) => exc.kind = r.read_i32()?,
            _ => r.skip(field_type, 0)?,
        }
    }
    Ok(exc)
}

fn eof(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, what.to_string())
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Cursor over a partially received message
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &str) -> io::Result<&'a [u8]> {
        if self.data.len() - self.pos < n {
            return Err(eof(what));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> io::Result<u8> {
        Ok(self.take(1, "byte")?[0])
    }

    fn read_bool(&mut self) -> io::Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    fn read_i16(&mut self) -> io::Result<i16> {
        let b = self.take(2, "i16")?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    fn read_i32(&mut self) -> io::Result<i32> {
        let b = self.take(4, "i32")?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_i64(&mut self) -> io::Result<i64> {
        let b = self.take(8, "i64")?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(i64::from_be_bytes(raw))
    }

    fn read_length(&mut self, limit: usize, what: &str) -> io::Result<usize> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(invalid(format!("negative {} length {}", what, len)));
        }
        let len = len as usize;
        if len > limit {
            return Err(invalid(format!(
                "{} length {} exceeds maximum allowed {}",
                what, len, limit
            )));
        }
        Ok(len)
    }

    fn read_binary(&mut self) -> io::Result<&'a [u8]> {
        let len = self.read_length(MAX_STRING_LENGTH, "string")?;
        self.take(len, "string data")
    }

    fn read_string(&mut self) -> io::Result<String> {
        Ok(String::from_utf8_lossy(self.read_binary()?).into_owned())
    }

    fn read_message_begin(&mut self) -> io::Result<(String, u8, i32)> {
        let word = self.read_i32()? as u32;
        if word & VERSION_MASK != VERSION_1 {
            return Err(invalid(format!(
                "bad protocol version in message header: 0x{:08X}",
                word
            )));
        }
        let kind = (word & TYPE_MASK) as u8;
        let name = self.read_string()?;
        let seqid = self.read_i32()?;
        Ok((name, kind, seqid))
    }

    fn read_field_begin(&mut self) -> io::Result<(u8, i16)> {
        let field_type = self.read_u8()?;
        if field_type == ttype::STOP {
            return Ok((ttype::STOP, 0));
        }
        let id = self.read_i16()?;
        Ok((field_type, id))
    }

    fn read_list_begin(&mut self) -> io::Result<(u8, usize)> {
        let elem_type = self.read_u8()?;
        let size = self.read_length(MAX_CONTAINER_SIZE, "list")?;
        Ok((elem_type, size))
    }

    fn read_string_list(&mut self) -> io::Result<Vec<String>> {
        let (elem_type, size) = self.read_list_begin()?;
        if elem_type != ttype::STRING {
            return Err(invalid(format!(
                "expected list<string>, got element type {}",
                elem_type
            )));
        }
        // Each element needs at least its 4-byte length prefix
        if (self.data.len() - self.pos) / 4 < size {
            return Err(eof("list elements"));
        }
        let mut values = Vec::with_capacity(size);
        for _ in 0..size {
            values.push(self.read_string()?);
        }
        Ok(values)
    }

    fn skip(&mut self, field_type: u8, depth: usize) -> io::Result<()> {
        if depth > MAX_SKIP_DEPTH {
            return Err(invalid("maximum nesting depth exceeded".to_string()));
        }
        match field_type {
            ttype::BOOL | ttype::BYTE => {
                self.take(1, "byte")?;
            }
            ttype::I16 => {
                self.take(2, "i16")?;
            }
            ttype::I32 => {
                self.take(4, "i32")?;
            }
            ttype::I64 | ttype::DOUBLE => {
                self.take(8, "i64")?;
            }
            ttype::STRING => {
                self.read_binary()?;
            }
            ttype::STRUCT => loop {
                let (inner, _) = self.read_field_begin()?;
                if inner == ttype::STOP {
                    break;
                }
                self.skip(inner, depth + 1)?;
            },
            ttype::MAP => {
                let key = self.read_u8()?;
                let value = self.read_u8()?;
                let size = self.read_length(MAX_CONTAINER_SIZE, "map")?;
                for _ in 0..size {
                    self.skip(key, depth + 1)?;
                    self.skip(value, depth + 1)?;
                }
            }
            ttype::SET | ttype::LIST => {
                let (elem, size) = self.read_list_begin()?;
                for _ in 0..size {
                    self.skip(elem, depth + 1)?;
                }
            }
            other => return Err(invalid(format!("cannot skip unknown type {}", other))),
        }
        Ok(())
    }
}
