//! HTML for the interactive page. Plain string templating, no framework.

use crate::session::Session;

const FONT_SIZES: [u32; 5] = [6, 8, 10, 12, 14];

pub fn render_page(session: &Session) -> String {
    let checked = |on: bool| if on { " checked" } else { "" };

    let font_options = FONT_SIZES
        .iter()
        .map(|size| {
            let selected = if *size == session.options.edge_fontsize {
                " selected"
            } else {
                ""
            };
            format!("          <option{selected}>{size}</option>")
        })
        .collect::<Vec<_>>()
        .join("\n");

    let events = session
        .enabled_events()
        .iter()
        .map(|event| {
            format!(
                "      <a href=\"/?event={}\">{}</a>",
                url_encode(event),
                escape_html(event)
            )
        })
        .collect::<Vec<_>>()
        .join("<br/>\n");

    let history = session
        .history()
        .iter()
        .rev()
        .map(|entry| format!("      {}", escape_html(&entry.to_string())))
        .collect::<Vec<_>>()
        .join("<br/>\n");

    format!(
        r#"<html>
  <head>
    <title>Sismograph Interactive Interpreter</title>
    <style>
      a:visited {{ color: blue; }}
    </style>
  </head>
  <body>
    <div>
      <img src="statechart.png?{seq}" style="max-width:100%; height:auto;"/>
    </div>
    <div>
      <form method="get">
        <input type="checkbox" name="include_guards" value="True"{guards}/> Show Guards,
        <input type="checkbox" name="include_actions" value="True"{actions}/> Show Actions,
        Font Size:
        <select name="edge_fontsize">
{font_options}
        </select>,
        <input type="checkbox" name="permissive" value="True"{permissive}/> Permissive Evaluation
        <input type="submit" name="fromform" value="update"/>
      </form>
    </div>
    <div>
      Click to trigger an event:<br/>
{events}
    </div>
    <br/>
    <div>
      <a href="/?reset=True">Click here</a> to start from the beginning.
    </div>
    <br/>
    <div>
      History of events and micro-steps in reverse order:<br/><br/>
{history}
    </div>
  </body>
</html>
"#,
        seq = session.image_seq(),
        guards = checked(session.options.include_guards),
        actions = checked(session.options.include_actions),
        permissive = checked(session.permissive),
    )
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Percent-encodes everything outside the URL-safe unreserved set.
pub fn url_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(char::from(byte));
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}
