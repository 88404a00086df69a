//! Protocol message encoding (Thrift strict binary)

use super::constants::{message_type, ttype, VERSION_1};
use super::message::{
    ApplicationException, BeeswaxException, Call, Method, Query, QueryHandle, RemoteError, Reply,
    ReplyEnvelope, Results, TStatus,
};
use bytes::{BufMut, BytesMut};
use std::io;

/// Encode a call into bytes
pub fn encode_call(call: &Call, seqid: i32) -> io::Result<BytesMut> {
    let mut buf = BytesMut::new();
    write_message_begin(&mut buf, call.method().name(), message_type::CALL, seqid)?;

    // Argument struct
    match call {
        Call::Query(query) => {
            write_field_begin(&mut buf, ttype::STRUCT, 1);
            write_query(&mut buf, query)?;
        }
        Call::GetState(handle) | Call::Close(handle) | Call::Cancel(handle) => {
            write_field_begin(&mut buf, ttype::STRUCT, 1);
            write_query_handle(&mut buf, handle)?;
        }
        Call::Fetch {
            handle,
            start_over,
            fetch_size,
        } => {
            write_field_begin(&mut buf, ttype::STRUCT, 1);
            write_query_handle(&mut buf, handle)?;
            write_field_begin(&mut buf, ttype::BOOL, 2);
            write_bool(&mut buf, *start_over);
            write_field_begin(&mut buf, ttype::I32, 3);
            buf.put_i32(*fetch_size);
        }
        Call::GetLog(context) => {
            write_field_begin(&mut buf, ttype::STRING, 1);
            write_string(&mut buf, context)?;
        }
    }
    buf.put_u8(ttype::STOP);

    Ok(buf)
}

/// Encode a reply into bytes
///
/// Declared exceptions travel inside a REPLY result struct; application
/// exceptions use the EXCEPTION message type.
pub fn encode_reply(reply: &ReplyEnvelope) -> io::Result<BytesMut> {
    let mut buf = BytesMut::new();
    let name = reply.method.name();

    let kind = match reply.outcome {
        Err(RemoteError::Application(_)) => message_type::EXCEPTION,
        _ => message_type::REPLY,
    };
    write_message_begin(&mut buf, name, kind, reply.seqid)?;

    // Result struct: field 0 = success, 1.. = declared exceptions
    match &reply.outcome {
        Err(RemoteError::Application(exc)) => {
            write_application_exception(&mut buf, exc)?;
            return Ok(buf);
        }
        Ok(Reply::Query(handle)) => {
            write_field_begin(&mut buf, ttype::STRUCT, 0);
            write_query_handle(&mut buf, handle)?;
        }
        Ok(Reply::GetState(state)) => {
            write_field_begin(&mut buf, ttype::I32, 0);
            buf.put_i32(state.as_i32());
        }
        Ok(Reply::Fetch(results)) => {
            write_field_begin(&mut buf, ttype::STRUCT, 0);
            write_results(&mut buf, results)?;
        }
        Ok(Reply::Close) => {}
        Ok(Reply::GetLog(log)) => {
            write_field_begin(&mut buf, ttype::STRING, 0);
            write_string(&mut buf, log)?;
        }
        Ok(Reply::Cancel(status)) => {
            write_field_begin(&mut buf, ttype::STRUCT, 0);
            write_status(&mut buf, status)?;
        }
        Err(RemoteError::QueryNotFound) => {
            // QueryNotFoundException is always declared as field 1
            write_field_begin(&mut buf, ttype::STRUCT, 1);
            buf.put_u8(ttype::STOP);
        }
        Err(RemoteError::Beeswax(exc)) => {
            // fetch and close declare BeeswaxException second
            let id = match reply.method {
                Method::Fetch | Method::Close => 2,
                _ => 1,
            };
            write_field_begin(&mut buf, ttype::STRUCT, id);
            write_beeswax_exception(&mut buf, exc)?;
        }
    }
    buf.put_u8(ttype::STOP);

    Ok(buf)
}

fn write_message_begin(buf: &mut BytesMut, name: &str, kind: u8, seqid: i32) -> io::Result<()> {
    buf.put_u32(VERSION_1 | kind as u32);
    write_string(buf, name)?;
    buf.put_i32(seqid);
    Ok(())
}

fn write_field_begin(buf: &mut BytesMut, field_type: u8, id: i16) {
    buf.put_u8(field_type);
    buf.put_i16(id);
}

fn write_bool(buf: &mut BytesMut, value: bool) {
    buf.put_u8(u8::from(value));
}

fn write_string(buf: &mut BytesMut, value: &str) -> io::Result<()> {
    let len = i32::try_from(value.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("string of {} bytes exceeds i32 length prefix", value.len()),
        )
    })?;
    buf.put_i32(len);
    buf.put(value.as_bytes());
    Ok(())
}

fn write_string_list(buf: &mut BytesMut, values: &[String]) -> io::Result<()> {
    let len = i32::try_from(values.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "list too long"))?;
    buf.put_u8(ttype::STRING);
    buf.put_i32(len);
    for value in values {
        write_string(buf, value)?;
    }
    Ok(())
}

fn write_query(buf: &mut BytesMut, query: &Query) -> io::Result<()> {
    write_field_begin(buf, ttype::STRING, 1);
    write_string(buf, &query.query)?;

    // Field 2 is unused in the Beeswax IDL
    write_field_begin(buf, ttype::LIST, 3);
    write_string_list(buf, &query.configuration)?;

    if let Some(ref user) = query.hadoop_user {
        write_field_begin(buf, ttype::STRING, 4);
        write_string(buf, user)?;
    }

    buf.put_u8(ttype::STOP);
    Ok(())
}

fn write_query_handle(buf: &mut BytesMut, handle: &QueryHandle) -> io::Result<()> {
    write_field_begin(buf, ttype::STRING, 1);
    write_string(buf, &handle.id)?;
    write_field_begin(buf, ttype::STRING, 2);
    write_string(buf, &handle.log_context)?;
    buf.put_u8(ttype::STOP);
    Ok(())
}

fn write_results(buf: &mut BytesMut, results: &Results) -> io::Result<()> {
    write_field_begin(buf, ttype::BOOL, 1);
    write_bool(buf, results.ready);
    write_field_begin(buf, ttype::LIST, 2);
    write_string_list(buf, &results.columns)?;
    write_field_begin(buf, ttype::LIST, 3);
    write_string_list(buf, &results.data)?;
    write_field_begin(buf, ttype::I64, 4);
    buf.put_i64(results.start_row);
    write_field_begin(buf, ttype::BOOL, 5);
    write_bool(buf, results.has_more);
    buf.put_u8(ttype::STOP);
    Ok(())
}

fn write_status(buf: &mut BytesMut, status: &TStatus) -> io::Result<()> {
    write_field_begin(buf, ttype::I32, 1);
    buf.put_i32(status.status_code);
    write_field_begin(buf, ttype::LIST, 2);
    write_string_list(buf, &status.error_msgs)?;
    buf.put_u8(ttype::STOP);
    Ok(())
}

fn write_beeswax_exception(buf: &mut BytesMut, exc: &BeeswaxException) -> io::Result<()> {
    write_field_begin(buf, ttype::STRING, 1);
    write_string(buf, &exc.message)?;
    write_field_begin(buf, ttype::STRING, 2);
    write_string(buf, &exc.log_context)?;
    if let Some(ref handle) = exc.handle {
        write_field_begin(buf, ttype::STRUCT, 3);
        write_query_handle(buf, handle)?;
    }
    if let Some(code) = exc.error_code {
        write_field_begin(buf, ttype::I32, 4);
        buf.put_i32(code);
    }
    if let Some(ref state) = exc.sql_state {
        write_field_begin(buf, ttype::STRING, 5);
        write_string(buf, state)?;
    }
    buf.put_u8(ttype::STOP);
    Ok(())
}

fn write_application_exception(buf: &mut BytesMut, exc: &ApplicationException) -> io::Result<()> {
    write_field_begin(buf, ttype::STRING, 1);
    write_string(buf, &exc.message)?;
    write_field_begin(buf, ttype::I32, 2);
    buf.put_i32(exc.kind);
    buf.put_u8(ttype::STOP);
    Ok(())
}
