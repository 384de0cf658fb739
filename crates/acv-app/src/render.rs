// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::de::IgnoredAny;
use serde_json::ser::{Formatter, PrettyFormatter};
use std::io;

use crate::model::RenderFormat;

pub const DEFAULT_JSON_INDENT: usize = 2;
pub const MAX_JSON_INDENT: usize = 8;

/// Renders a raw value for display. JSON that fails to parse is shown as-is;
/// free-text values are expected, so this never reports an error.
pub fn format_value(raw: &str, format: RenderFormat) -> String {
    format_value_with_indent(raw, format, DEFAULT_JSON_INDENT)
}

pub fn format_value_with_indent(raw: &str, format: RenderFormat, indent: usize) -> String {
    match format {
        RenderFormat::Plain => raw.to_owned(),
        RenderFormat::Json => pretty_json(raw, indent).unwrap_or_else(|| raw.to_owned()),
    }
}

/// Re-indents valid JSON token by token. Number and string literals are
/// copied verbatim and repeated object keys are kept, so only whitespace
/// changes.
fn pretty_json(raw: &str, indent: usize) -> Option<String> {
    serde_json::from_str::<IgnoredAny>(raw).ok()?;
    let indent = " ".repeat(indent.clamp(1, MAX_JSON_INDENT));
    let mut formatter = PrettyFormatter::with_indent(indent.as_bytes());
    let mut out = Vec::with_capacity(raw.len() * 2);
    reindent(raw, &mut formatter, &mut out).ok()?;
    String::from_utf8(out).ok()
}

enum Frame {
    Array { first: bool },
    Object { first: bool, awaiting_key: bool },
}

/// Replays the tokens of already validated JSON through `formatter`, in the
/// same call order serde_json's serializer uses.
fn reindent<F: Formatter>(raw: &str, formatter: &mut F, out: &mut Vec<u8>) -> io::Result<()> {
    let bytes = raw.as_bytes();
    let mut stack: Vec<Frame> = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b' ' | b'\t' | b'\n' | b'\r' => pos += 1,
            b'{' => {
                before_value(&mut stack, formatter, out)?;
                formatter.begin_object(out)?;
                stack.push(Frame::Object {
                    first: true,
                    awaiting_key: true,
                });
                pos += 1;
            }
            b'[' => {
                before_value(&mut stack, formatter, out)?;
                formatter.begin_array(out)?;
                stack.push(Frame::Array { first: true });
                pos += 1;
            }
            b'}' => {
                stack.pop();
                formatter.end_object(out)?;
                after_value(&stack, formatter, out)?;
                pos += 1;
            }
            b']' => {
                stack.pop();
                formatter.end_array(out)?;
                after_value(&stack, formatter, out)?;
                pos += 1;
            }
            b',' => {
                if let Some(Frame::Object { awaiting_key, .. }) = stack.last_mut() {
                    *awaiting_key = true;
                }
                pos += 1;
            }
            b':' => {
                if let Some(Frame::Object { awaiting_key, .. }) = stack.last_mut() {
                    *awaiting_key = false;
                }
                formatter.end_object_key(out)?;
                formatter.begin_object_value(out)?;
                pos += 1;
            }
            b'"' => {
                let end = string_end(bytes, pos);
                let literal = &raw[pos..end];
                if let Some(Frame::Object {
                    first,
                    awaiting_key: true,
                }) = stack.last_mut()
                {
                    formatter.begin_object_key(out, *first)?;
                    *first = false;
                    formatter.write_raw_fragment(out, literal)?;
                } else {
                    before_value(&mut stack, formatter, out)?;
                    formatter.write_raw_fragment(out, literal)?;
                    after_value(&stack, formatter, out)?;
                }
                pos = end;
            }
            first_byte => {
                let end = scalar_end(bytes, pos);
                let literal = &raw[pos..end];
                before_value(&mut stack, formatter, out)?;
                if first_byte == b'-' || first_byte.is_ascii_digit() {
                    formatter.write_number_str(out, literal)?;
                } else {
                    formatter.write_raw_fragment(out, literal)?;
                }
                after_value(&stack, formatter, out)?;
                pos = end;
            }
        }
    }
    Ok(())
}

fn before_value<F: Formatter>(
    stack: &mut [Frame],
    formatter: &mut F,
    out: &mut Vec<u8>,
) -> io::Result<()> {
    if let Some(Frame::Array { first }) = stack.last_mut() {
        formatter.begin_array_value(out, *first)?;
        *first = false;
    }
    Ok(())
}

fn after_value<F: Formatter>(
    stack: &[Frame],
    formatter: &mut F,
    out: &mut Vec<u8>,
) -> io::Result<()> {
    match stack.last() {
        Some(Frame::Array { .. }) => formatter.end_array_value(out),
        Some(Frame::Object { .. }) => formatter.end_object_value(out),
        None => Ok(()),
    }
}

/// Index just past the closing quote of the string starting at `start`.
fn string_end(bytes: &[u8], start: usize) -> usize {
    let mut pos = start + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'"' => return pos + 1,
            _ => pos += 1,
        }
    }
    bytes.len()
}

/// Index just past a number, `true`, `false` or `null`.
fn scalar_end(bytes: &[u8], start: usize) -> usize {
    let mut pos = start;
    while pos < bytes.len()
        && (bytes[pos].is_ascii_alphanumeric() || matches!(bytes[pos], b'-' | b'+' | b'.'))
    {
        pos += 1;
    }
    pos.max(start + 1)
}
