//! Output stream with glue and newline handling.
//!
//! Text is pushed fragment by fragment. Leading and trailing newlines of a
//! fragment are split off so glue can remove them later. Rendering collapses
//! runs of inline whitespace and trims spaces at line boundaries.

use weave_ir::PushPopType;

use super::call_stack::CallStack;

#[derive(Clone, Debug, PartialEq)]
pub enum OutputItem {
    Text(String),
    Tag(String),
    Glue,
    BeginString,
    BeginTag,
    EndTag,
}

impl OutputItem {
    fn is_control(&self) -> bool {
        matches!(
            self,
            OutputItem::BeginString | OutputItem::BeginTag | OutputItem::EndTag
        )
    }
}

fn is_newline(s: &str) -> bool {
    s == "\n"
}

fn is_inline_whitespace(s: &str) -> bool {
    s.chars().all(|c| c == ' ' || c == '\t')
}

fn is_non_whitespace(s: &str) -> bool {
    !is_newline(s) && !is_inline_whitespace(s)
}

#[derive(Clone, Debug, Default)]
pub struct OutputStream {
    items: Vec<OutputItem>,
}

impl OutputStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[OutputItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub(crate) fn from_items(items: Vec<OutputItem>) -> Self {
        Self { items }
    }

    /// Removes and returns the last `n` items in stream order.
    pub fn pop_n(&mut self, n: usize) -> Vec<OutputItem> {
        let start = self.items.len().saturating_sub(n);
        self.items.split_off(start)
    }

    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    pub fn push(&mut self, item: OutputItem, call_stack: &mut CallStack) {
        if let OutputItem::Text(text) = &item {
            if let Some(parts) = split_head_tail_whitespace(text) {
                for part in parts {
                    self.push_individual(OutputItem::Text(part), call_stack);
                }
                return;
            }
        }
        self.push_individual(item, call_stack);
    }

    fn push_individual(&mut self, item: OutputItem, call_stack: &mut CallStack) {
        let mut include = true;
        match &item {
            OutputItem::Glue => self.trim_newlines(),
            OutputItem::Text(text) => {
                let mut function_trim: Option<usize> = None;
                let frame = call_stack.current_frame();
                if frame.kind == PushPopType::Function {
                    function_trim = Some(frame.function_start_in_output);
                }

                let mut glue_trim: Option<usize> = None;
                for (i, o) in self.items.iter().enumerate().rev() {
                    match o {
                        OutputItem::Glue => {
                            glue_trim = Some(i);
                            break;
                        }
                        OutputItem::BeginString => {
                            if function_trim.is_some_and(|f| i >= f) {
                                function_trim = None;
                            }
                            break;
                        }
                        _ => {}
                    }
                }

                let trim = match (glue_trim, function_trim) {
                    (Some(g), Some(f)) => Some(g.min(f)),
                    (g, f) => g.or(f),
                };

                if trim.is_some() {
                    if is_newline(text) {
                        include = false;
                    } else if is_non_whitespace(text) {
                        if glue_trim.is_some() {
                            self.remove_existing_glue();
                        }
                        if function_trim.is_some() {
                            let frames = &mut call_stack.current_thread_mut().frames;
                            for f in frames.iter_mut().rev() {
                                if f.kind != PushPopType::Function {
                                    break;
                                }
                                f.function_start_in_output = usize::MAX;
                            }
                        }
                    }
                } else if is_newline(text) && (self.ends_in_newline() || !self.contains_content())
                {
                    include = false;
                }
            }
            _ => {}
        }
        if include {
            self.items.push(item);
        }
    }

    fn trim_newlines(&mut self) {
        let mut remove_from: Option<usize> = None;
        for (i, o) in self.items.iter().enumerate().rev() {
            match o {
                o if o.is_control() => break,
                OutputItem::Text(t) if is_non_whitespace(t) => break,
                OutputItem::Text(t) if is_newline(t) => remove_from = Some(i),
                _ => {}
            }
        }
        if let Some(from) = remove_from {
            let mut i = from;
            while i < self.items.len() {
                if matches!(self.items[i], OutputItem::Text(_)) {
                    self.items.remove(i);
                } else {
                    i += 1;
                }
            }
        }
    }

    fn remove_existing_glue(&mut self) {
        let mut i = self.items.len();
        while i > 0 {
            i -= 1;
            match &self.items[i] {
                OutputItem::Glue => {
                    self.items.remove(i);
                }
                o if o.is_control() => break,
                _ => {}
            }
        }
    }

    /// Drops trailing newlines and inline whitespace a function produced.
    pub fn trim_function_end(&mut self, function_start: usize) {
        let start = if function_start == usize::MAX {
            0
        } else {
            function_start
        };
        let mut i = self.items.len();
        while i > start {
            i -= 1;
            let t = match &self.items[i] {
                OutputItem::Text(t) => t,
                o if o.is_control() => break,
                _ => continue,
            };
            if is_newline(t) || is_inline_whitespace(t) {
                self.items.remove(i);
            } else {
                break;
            }
        }
    }

    pub fn ends_in_newline(&self) -> bool {
        for o in self.items.iter().rev() {
            match o {
                o if o.is_control() => break,
                OutputItem::Text(t) if is_newline(t) => return true,
                OutputItem::Text(t) if is_non_whitespace(t) => break,
                _ => {}
            }
        }
        false
    }

    pub fn contains_content(&self) -> bool {
        self.items.iter().any(|o| matches!(o, OutputItem::Text(_)))
    }

    pub fn in_string_evaluation(&self) -> bool {
        self.items
            .iter()
            .rev()
            .any(|o| matches!(o, OutputItem::BeginString))
    }

    pub fn current_text(&self) -> String {
        let mut raw = String::new();
        let mut in_tag = false;
        for o in &self.items {
            match o {
                OutputItem::Text(t) if !in_tag => raw.push_str(t),
                OutputItem::BeginTag => in_tag = true,
                OutputItem::EndTag => in_tag = false,
                _ => {}
            }
        }
        clean_output_whitespace(&raw)
    }

    pub fn current_tags(&self) -> Vec<String> {
        let mut tags = Vec::new();
        let mut in_tag = false;
        let mut buf = String::new();
        for o in &self.items {
            match o {
                OutputItem::BeginTag => {
                    if in_tag && !buf.is_empty() {
                        tags.push(clean_output_whitespace(&buf));
                        buf.clear();
                    }
                    in_tag = true;
                }
                OutputItem::EndTag => {
                    if !buf.is_empty() {
                        tags.push(clean_output_whitespace(&buf));
                        buf.clear();
                    }
                    in_tag = false;
                }
                OutputItem::Text(t) if in_tag => buf.push_str(t),
                OutputItem::Tag(t) if !t.is_empty() => tags.push(t.clone()),
                _ => {}
            }
        }
        if !buf.is_empty() {
            tags.push(clean_output_whitespace(&buf));
        }
        tags
    }
}

/// Splits `"\n  text \n"` style fragments into separate newline and text
/// parts. Returns `None` when there is nothing to split.
fn split_head_tail_whitespace(s: &str) -> Option<Vec<String>> {
    let bytes = s.as_bytes();
    let mut head_first = None;
    let mut head_last = 0;
    for (i, &c) in bytes.iter().enumerate() {
        match c {
            b'\n' => {
                head_first.get_or_insert(i);
                head_last = i;
            }
            b' ' | b'\t' => {}
            _ => break,
        }
    }

    let mut tail_last = None;
    let mut tail_first = 0;
    for (i, &c) in bytes.iter().enumerate().rev() {
        match c {
            b'\n' => {
                tail_last.get_or_insert(i);
                tail_first = i;
            }
            b' ' | b'\t' => {}
            _ => break,
        }
    }

    if head_first.is_none() && tail_last.is_none() {
        return None;
    }
    if is_newline(s) {
        return None;
    }

    let mut parts = Vec::new();
    let mut inner_start = 0;
    let mut inner_end = s.len();
    if let Some(first) = head_first {
        if first > 0 {
            parts.push(s[..first].to_string());
        }
        parts.push("\n".to_string());
        inner_start = head_last + 1;
    }
    if tail_last.is_some() {
        inner_end = tail_first;
    }
    if inner_end > inner_start {
        parts.push(s[inner_start..inner_end].to_string());
    }
    if let Some(last) = tail_last {
        if tail_first > head_last || head_first.is_none() {
            parts.push("\n".to_string());
            if last + 1 < s.len() {
                parts.push(s[last + 1..].to_string());
            }
        }
    }
    Some(parts)
}

/// Collapses inline whitespace runs to one space and trims it at line edges.
pub fn clean_output_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut ws_start: Option<usize> = None;
    let mut line_start = 0;
    for (i, c) in s.char_indices() {
        let inline_ws = c == ' ' || c == '\t';
        if inline_ws && ws_start.is_none() {
            ws_start = Some(i);
        }
        if !inline_ws {
            if let Some(start) = ws_start {
                if c != '\n' && start > 0 && start != line_start {
                    out.push(' ');
                }
            }
            ws_start = None;
        }
        if c == '\n' {
            line_start = i + 1;
        }
        if !inline_ws {
            out.push(c);
        }
    }
    out
}
