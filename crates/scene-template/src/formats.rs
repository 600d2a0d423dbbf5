//! Built-in formatters

use crate::format::{FormatContext, FormatInput};
use chrono::{DateTime, SecondsFormat, Utc};

pub(crate) fn glob(input: &FormatInput, _args: &[&str], _ctx: &FormatContext<'_>) -> String {
    match input {
        FormatInput::Multi(values) if values.len() > 1 => format!("{{{}}}", values.join(",")),
        other => other.joined(","),
    }
}

pub(crate) fn text(_input: &FormatInput, _args: &[&str], ctx: &FormatContext<'_>) -> String {
    ctx.variable.value_text(ctx.field_path)
}

pub(crate) fn raw(input: &FormatInput, _args: &[&str], _ctx: &FormatContext<'_>) -> String {
    input.joined(",")
}

pub(crate) fn regex(input: &FormatInput, _args: &[&str], _ctx: &FormatContext<'_>) -> String {
    match input {
        FormatInput::Single(v) => escape_regex(v),
        FormatInput::Multi(values) => {
            let escaped: Vec<String> = values.iter().map(|v| escape_regex(v)).collect();
            if escaped.len() == 1 {
                escaped.into_iter().next().unwrap_or_default()
            } else {
                format!("({})", escaped.join("|"))
            }
        }
    }
}

pub(crate) fn pipe(input: &FormatInput, _args: &[&str], _ctx: &FormatContext<'_>) -> String {
    input.joined("|")
}

pub(crate) fn csv(input: &FormatInput, _args: &[&str], _ctx: &FormatContext<'_>) -> String {
    input.joined(",")
}

pub(crate) fn json(input: &FormatInput, _args: &[&str], _ctx: &FormatContext<'_>) -> String {
    match input {
        FormatInput::Single(v) => serde_json::Value::String(v.clone()).to_string(),
        FormatInput::Multi(values) => serde_json::Value::Array(
            values
                .iter()
                .map(|v| serde_json::Value::String(v.clone()))
                .collect(),
        )
        .to_string(),
    }
}

pub(crate) fn lucene(input: &FormatInput, _args: &[&str], _ctx: &FormatContext<'_>) -> String {
    match input {
        FormatInput::Single(v) => escape_lucene(v),
        FormatInput::Multi(values) if values.is_empty() => "__empty__".to_string(),
        FormatInput::Multi(values) => {
            let quoted: Vec<String> = values
                .iter()
                .map(|v| format!("\"{}\"", escape_lucene(v)))
                .collect();
            format!("({})", quoted.join(" OR "))
        }
    }
}

pub(crate) fn distributed(input: &FormatInput, _args: &[&str], ctx: &FormatContext<'_>) -> String {
    match input {
        FormatInput::Single(v) => v.clone(),
        FormatInput::Multi(values) => {
            let name = ctx.variable.name();
            values
                .iter()
                .enumerate()
                .map(|(i, v)| if i == 0 { v.clone() } else { format!("{name}={v}") })
                .collect::<Vec<_>>()
                .join(",")
        }
    }
}

pub(crate) fn single_quote(input: &FormatInput, _args: &[&str], _ctx: &FormatContext<'_>) -> String {
    input
        .map(|v| format!("'{}'", v.replace('\'', "\\'")))
        .join(",")
}

pub(crate) fn double_quote(input: &FormatInput, _args: &[&str], _ctx: &FormatContext<'_>) -> String {
    input
        .map(|v| format!("\"{}\"", v.replace('"', "\\\"")))
        .join(",")
}

pub(crate) fn sql_string(input: &FormatInput, _args: &[&str], _ctx: &FormatContext<'_>) -> String {
    input
        .map(|v| format!("'{}'", v.replace('\'', "''")))
        .join(",")
}

pub(crate) fn percent_encode(input: &FormatInput, _args: &[&str], _ctx: &FormatContext<'_>) -> String {
    match input {
        FormatInput::Single(v) => urlencoding::encode(v).into_owned(),
        FormatInput::Multi(values) => {
            urlencoding::encode(&format!("{{{}}}", values.join(","))).into_owned()
        }
    }
}

pub(crate) fn uri_encode(input: &FormatInput, _args: &[&str], _ctx: &FormatContext<'_>) -> String {
    match input {
        FormatInput::Single(v) => encode_uri(v),
        FormatInput::Multi(values) => encode_uri(&format!("{{{}}}", values.join(","))),
    }
}

pub(crate) fn html_escape(input: &FormatInput, _args: &[&str], _ctx: &FormatContext<'_>) -> String {
    let mut out = String::new();
    for c in input.joined(",").chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

pub(crate) fn query_param(input: &FormatInput, _args: &[&str], ctx: &FormatContext<'_>) -> String {
    let param = format!("var-{}", ctx.variable.name());
    input
        .map(|v| format!("{param}={}", urlencoding::encode(v)))
        .join("&")
}

/// `${v:customqueryparam:name}`; without an argument the parameter is `var-<variable>`
pub(crate) fn custom_query_param(input: &FormatInput, args: &[&str], ctx: &FormatContext<'_>) -> String {
    let param = match args.first() {
        Some(name) if !name.is_empty() => (*name).to_string(),
        _ => format!("var-{}", ctx.variable.name()),
    };
    let encoded_param = urlencoding::encode(&param).into_owned();
    input
        .map(|v| format!("{encoded_param}={}", urlencoding::encode(v)))
        .join("&")
}

pub(crate) fn join(input: &FormatInput, args: &[&str], _ctx: &FormatContext<'_>) -> String {
    input.joined(args.first().copied().unwrap_or(","))
}

/// Epoch milliseconds as a date
///
/// Arguments: none (milliseconds), `seconds`, `iso`, or a strftime pattern.
/// Values that are not numbers are returned unchanged.
pub(crate) fn date(input: &FormatInput, args: &[&str], _ctx: &FormatContext<'_>) -> String {
    let raw = match input {
        FormatInput::Single(v) => v.clone(),
        FormatInput::Multi(values) => values.first().cloned().unwrap_or_default(),
    };
    let Ok(millis) = raw.trim().parse::<f64>() else {
        return raw;
    };
    // Float to integer casts saturate; any fraction of a millisecond is dropped.
    #[allow(clippy::cast_possible_truncation)]
    let millis = millis as i64;

    match args.first().copied() {
        None | Some("") => millis.to_string(),
        Some("seconds") => millis.div_euclid(1000).to_string(),
        Some(pattern) => {
            let Some(datetime) = DateTime::<Utc>::from_timestamp_millis(millis) else {
                return raw;
            };
            if pattern == "iso" {
                datetime.to_rfc3339_opts(SecondsFormat::Millis, true)
            } else {
                // Arguments are split on ':', so time patterns arrive in pieces.
                datetime.format(&args.join(":")).to_string()
            }
        }
    }
}

fn escape_regex(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(
            c,
            '\\' | '^' | '$' | '*' | '+' | '?' | '.' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '/'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn escape_lucene(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_whitespace()
            || matches!(
                c,
                '!' | '*' | '+' | '-' | '=' | '<' | '>' | '&' | '|' | '(' | ')' | '[' | ']' | '{'
                    | '}' | '^' | '~' | '?' | ':' | '\\' | '/' | '"'
            )
        {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `encodeURI`: keeps unreserved and reserved URI characters
fn encode_uri(value: &str) -> String {
    const KEEP: &[u8] = b"-_.!~*'();/?:@&=+$,#";
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || KEEP.contains(&byte) {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
