//! text/event-stream 增量解码
//!
//! 字节块可能在任意位置被切开（包括多字节 UTF-8 字符中间），解码器只在拿到完整的行后才解析。

/// 一条完整的 SSE 事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// `event:` 字段，未设置时为 None
    pub event: Option<String>,
    /// 多行 `data:` 以 `\n` 连接
    pub data: String,
    /// 最近一次的 `id:`
    pub id: Option<String>,
    /// 服务端建议的重连间隔（毫秒）
    pub retry: Option<u64>,
}

impl SseEvent {
    /// 是否为默认消息事件（对应浏览器 `onmessage`）
    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("message"))
    }
}

/// SSE 解码器
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data_lines: Vec<String>,
    event: Option<String>,
    last_event_id: Option<String>,
    retry: Option<u64>,
    started: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 输入一个字节块，返回其中已完整的事件
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut consumed = 0;

        while let Some(offset) = self.buffer[consumed..]
            .iter()
            .position(|b| *b == b'\n' || *b == b'\r')
        {
            let line_end = consumed + offset;
            let terminator = if self.buffer[line_end] == b'\r' {
                match self.buffer.get(line_end + 1) {
                    Some(b'\n') => 2,
                    Some(_) => 1,
                    // `\r` 在块末尾，等下一块确认是否为 `\r\n`
                    None => break,
                }
            } else {
                1
            };

            let line = String::from_utf8_lossy(&self.buffer[consumed..line_end]).into_owned();
            consumed = line_end + terminator;

            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        self.buffer.drain(..consumed);
        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        let line = if self.started {
            line
        } else {
            self.started = true;
            line.strip_prefix('\u{feff}').unwrap_or(line)
        };

        if line.is_empty() {
            return self.dispatch();
        }

        // 注释行（常用作心跳）
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data_lines.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_string());
                }
            }
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Some(ms);
                }
            }
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data_lines.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data_lines).join("\n");

        Some(SseEvent {
            event,
            data,
            id: self.last_event_id.clone(),
            retry: self.retry,
        })
    }
}
