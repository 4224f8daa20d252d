//! SSE 行缓冲
//!
//! 网络 chunk 边界和 SSE 行边界没有任何对齐保证：一行 `data: {...}`
//! 可能被 TCP 分段切在任意字节偏移上。这里维护一个累积缓冲区，
//! 每次追加后只吐出完整的行，残余部分留到下一个 chunk。

/// 累积式行缓冲
///
/// 按字节缓冲、按 `\n` 切分，保证 UTF-8 多字节序列被 chunk 边界
/// 切开时不会损坏。
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buf: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个 chunk，返回其中所有完整的行（已去掉行尾 `\r\n`/`\n`）
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let rest = self.buf.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.buf, rest);
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// 流结束时取出残余部分（没有换行结尾的最后一行）
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        Some(line)
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_complete_line() {
        let mut buf = SseLineBuffer::new();
        let lines = buf.push(b"data: {\"a\":1}\n");
        assert_eq!(lines, ["data: {\"a\":1}"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_split_mid_line() {
        let mut buf = SseLineBuffer::new();
        assert!(buf.push(b"data: {\"te").is_empty());
        let lines = buf.push(b"xt\":\"hi\"}\n");
        assert_eq!(lines, ["data: {\"text\":\"hi\"}"]);
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let mut buf = SseLineBuffer::new();
        let lines = buf.push(b"line1\nline2\nline3 partial");
        assert_eq!(lines, ["line1", "line2"]);
        assert_eq!(buf.take_remainder().as_deref(), Some("line3 partial"));
        assert!(buf.take_remainder().is_none());
    }

    #[test]
    fn test_crlf_stripped() {
        let mut buf = SseLineBuffer::new();
        let lines = buf.push(b"data: x\r\ndata: y\r\n");
        assert_eq!(lines, ["data: x", "data: y"]);
    }

    #[test]
    fn test_empty_lines_preserved() {
        // SSE 用空行分隔事件，空行也要作为完整行吐出
        let mut buf = SseLineBuffer::new();
        let lines = buf.push(b"data: x\n\ndata: y\n");
        assert_eq!(lines, ["data: x", "", "data: y"]);
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let text = "data: 你好\n".as_bytes();
        // 在多字节序列中间切开
        let mut buf = SseLineBuffer::new();
        assert!(buf.push(&text[..8]).is_empty());
        let lines = buf.push(&text[8..]);
        assert_eq!(lines, ["data: 你好"]);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// 任意切分方式都产生与整块输入相同的行序列
        #[test]
        fn prop_chunking_invariant(
            lines in prop::collection::vec("[a-zA-Z0-9 :{}\"]{0,40}", 1..8),
            chunk_size in 1usize..16,
        ) {
            let payload: String = lines.iter().map(|l| format!("{}\n", l)).collect();
            let bytes = payload.as_bytes();

            // 整块输入
            let mut whole = SseLineBuffer::new();
            let expected = whole.push(bytes);

            // 按固定大小切分输入
            let mut chunked = SseLineBuffer::new();
            let mut actual = Vec::new();
            for chunk in bytes.chunks(chunk_size) {
                actual.extend(chunked.push(chunk));
            }

            prop_assert_eq!(expected, actual);
            prop_assert!(chunked.is_empty());
        }
    }
}
