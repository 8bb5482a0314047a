//! HTML pages for browser-facing routes (status, docs, OAuth results)

use rmcp::model::Tool;

/// Escape text for inclusion in HTML element content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>\n{body}\n</body>\n</html>\n"
    )
}

pub fn index(authenticated: bool) -> String {
    let (status, detail) = if authenticated {
        ("Authenticated", "You are authenticated with Etsy.")
    } else {
        ("Not Authenticated", "You need to authenticate with Etsy.")
    };
    layout(
        "Etsy MCP Server",
        &format!(
            "<h1>Etsy MCP Server</h1>\n\
             <p>Status: {status}</p>\n\
             <p>{detail}</p>\n\
             <ul>\n\
             <li><a href=\"/auth\">Authenticate with Etsy</a></li>\n\
             <li><a href=\"/mcp/schema\">MCP Schema</a></li>\n\
             <li><a href=\"/docs\">Documentation</a></li>\n\
             <li><a href=\"/health\">Health</a></li>\n\
             </ul>"
        ),
    )
}

pub fn docs(tools: &[Tool], mcp_url: &str) -> String {
    let items: String = tools
        .iter()
        .map(|tool| {
            format!(
                "<li><code>{}</code> - {}</li>\n",
                escape_html(&tool.name),
                escape_html(tool.description.as_deref().unwrap_or(""))
            )
        })
        .collect();
    layout(
        "Etsy MCP Server Documentation",
        &format!(
            "<h1>Etsy MCP Server Documentation</h1>\n\
             <h2>Available MCP Tools</h2>\n\
             <ul>\n{items}</ul>\n\
             <h2>Connecting an MCP client</h2>\n\
             <ol>\n\
             <li>Make sure the server is running and <a href=\"/auth\">authenticated</a></li>\n\
             <li>Add a Streamable HTTP server with URL: <code>{}</code></li>\n\
             <li>The client discovers the tools above automatically</li>\n\
             </ol>",
            escape_html(mcp_url)
        ),
    )
}

pub fn auth_success() -> String {
    layout(
        "Authentication Successful",
        "<h1>Authentication Successful!</h1>\n\
         <p>Your Etsy OAuth tokens have been saved.</p>\n\
         <p>You can now close this window and use the MCP server.</p>\n\
         <p><a href=\"/\">Return to Home</a></p>",
    )
}

pub fn auth_failure(message: &str) -> String {
    layout(
        "Authentication Failed",
        &format!(
            "<h1>Authentication Failed</h1>\n\
             <p>Error: {}</p>\n\
             <p>Please <a href=\"/auth\">try again</a>.</p>\n\
             <p><a href=\"/\">Return to Home</a></p>",
            escape_html(message)
        ),
    )
}
