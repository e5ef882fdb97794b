//! Minimal server-sent-events line handling shared by the backend clients

/// Pull complete `data:` payloads out of the SSE line buffer. SSE events can
/// be split across TCP packets, so incomplete trailing lines stay buffered.
pub(crate) fn drain_sse_data_lines(buf: &mut String) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(nl_pos) = buf.find('\n') {
        let line: String = buf.drain(..=nl_pos).collect();
        let line = line.trim();
        if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim();
            if !data.is_empty() {
                out.push(data.to_string());
            }
        }
    }
    out
}
