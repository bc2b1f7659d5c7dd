//! The interactive HTTP endpoint.
//!
//! Deliberately single-threaded: requests are handled one at a time, which
//! serializes every session mutation and guarantees that at most one event
//! is in flight when the renderer runs.

use crate::html;
use crate::session::Session;
use tiny_http::{Header, Response, Server};

pub fn serve(mut session: Session, addr: &str) -> Result<(), String> {
    let server = Server::http(addr).map_err(|e| format!("failed to bind {addr}: {e}"))?;
    eprintln!("Serving interactive statechart on http://{addr}/");
    session.refresh_image();

    for request in server.incoming_requests() {
        let url = request.url().to_string();
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path, query),
            None => (url.as_str(), ""),
        };

        match path {
            "/" => {
                apply_query(&mut session, &parse_query(query));
                let page = html::render_page(&session);
                let response = with_content_type(
                    Response::from_string(page),
                    "text/html; charset=utf-8",
                );
                let _ = request.respond(response);
            }
            "/statechart.png" => match session.image() {
                Some(bytes) => {
                    let response =
                        with_content_type(Response::from_data(bytes.to_vec()), "image/png");
                    let _ = request.respond(response);
                }
                None => {
                    let _ = request
                        .respond(Response::from_string("no image rendered").with_status_code(404));
                }
            },
            _ => {
                let _ = request.respond(Response::from_string("not found").with_status_code(404));
            }
        }
    }
    Ok(())
}

fn apply_query(session: &mut Session, params: &[(String, String)]) {
    let get = |name: &str| {
        params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    };

    if get("reset").is_some() {
        if let Err(err) = session.reset() {
            tracing::warn!(%err, "reset failed; keeping current session");
        }
    }

    // Checkbox semantics: an unchecked box is simply absent from the form
    // submission, so presence of `fromform` gates the whole block.
    if get("fromform").is_some() {
        session.options.include_guards = get("include_guards").is_some();
        session.options.include_actions = get("include_actions").is_some();
        session.permissive = get("permissive").is_some();
        if let Some(size) = get("edge_fontsize").and_then(|v| v.parse::<u32>().ok()) {
            session.options.edge_fontsize = size;
        }
        session.apply_eval_mode();
    }

    if let Some(event) = get("event") {
        if !event.is_empty() {
            session.trigger(event);
        }
    }

    session.refresh_image();
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (url_decode(key), url_decode(value)),
            None => (url_decode(pair), String::new()),
        })
        .collect()
}

fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 3 <= bytes.len() => {
                match hex_byte(bytes[i + 1], bytes[i + 2]) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_byte(hi: u8, lo: u8) -> Option<u8> {
    let hi = (hi as char).to_digit(16)?;
    let lo = (lo as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}

fn with_content_type<R: std::io::Read>(
    response: Response<R>,
    content_type: &str,
) -> Response<R> {
    match Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}
