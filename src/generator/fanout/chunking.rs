//! 翻译前的段落分块

pub const PARAGRAPH_SEPARATOR: &str = "\n\n";
const LINE_SEPARATOR: &str = "\n";

/// 分块与前一块的拼接方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Joint {
    /// 段落边界，重新拼接时使用空行
    Paragraph,
    /// 超长段落内部的换行
    Line,
    /// 超长单行内部的切分点，保留原有的空白
    Inline(String),
}

impl Joint {
    pub fn separator(&self) -> &str {
        match self {
            Joint::Paragraph => PARAGRAPH_SEPARATOR,
            Joint::Line => LINE_SEPARATOR,
            Joint::Inline(gap) => gap,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub joint: Joint,
}

/// 以空行划分段落，忽略空白段落
pub fn split_paragraphs(text: &str) -> Vec<&str> {
    text.split(PARAGRAPH_SEPARATOR)
        .map(|paragraph| paragraph.trim_matches(|c| c == '\n' || c == '\r'))
        .filter(|paragraph| !paragraph.trim().is_empty())
        .collect()
}

/// 贪心合并段落，使每块不超过max_chars个字符；
/// 单个段落超长时先按行切分，超长的行在空白处切分，仍超长的单词按字符硬切。
/// 按joint拼回各块即得到原文（段落首尾的换行除外）
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<Chunk> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for paragraph in split_paragraphs(text) {
        let paragraph_len = paragraph.chars().count();

        if paragraph_len > max_chars {
            if !current.is_empty() {
                chunks.push(Chunk {
                    text: std::mem::take(&mut current),
                    joint: Joint::Paragraph,
                });
                current_len = 0;
            }
            chunks.extend(split_oversized(paragraph, max_chars));
            continue;
        }

        let needed = if current.is_empty() {
            paragraph_len
        } else {
            current_len + PARAGRAPH_SEPARATOR.len() + paragraph_len
        };

        if needed > max_chars {
            chunks.push(Chunk {
                text: std::mem::take(&mut current),
                joint: Joint::Paragraph,
            });
            current.push_str(paragraph);
            current_len = paragraph_len;
        } else {
            if !current.is_empty() {
                current.push_str(PARAGRAPH_SEPARATOR);
            }
            current.push_str(paragraph);
            current_len = needed;
        }
    }

    if !current.is_empty() {
        chunks.push(Chunk {
            text: current,
            joint: Joint::Paragraph,
        });
    }
    chunks
}

/// 按行合并，首块的joint为段落边界
fn split_oversized(paragraph: &str, max_chars: usize) -> Vec<Chunk> {
    let mut pieces = Vec::new();
    let mut current: Option<Chunk> = None;
    let mut current_len = 0;

    for (index, line) in paragraph.split('\n').enumerate() {
        let joint = if index == 0 {
            Joint::Paragraph
        } else {
            Joint::Line
        };
        let line_len = line.chars().count();

        if line_len > max_chars {
            pieces.extend(current.take());
            let mut line_pieces = split_line(line, max_chars);
            if let Some(first) = line_pieces.first_mut() {
                first.joint = joint;
            }
            pieces.extend(line_pieces);
            continue;
        }

        let fits = current.is_some() && current_len + LINE_SEPARATOR.len() + line_len <= max_chars;
        if fits {
            if let Some(chunk) = current.as_mut() {
                chunk.text.push_str(LINE_SEPARATOR);
                chunk.text.push_str(line);
                current_len += LINE_SEPARATOR.len() + line_len;
            }
        } else {
            pieces.extend(current.take());
            current = Some(Chunk {
                text: line.to_string(),
                joint,
            });
            current_len = line_len;
        }
    }

    pieces.extend(current);
    pieces
}

/// 在空白处切分单行，切分点的空白记录在下一块的joint中
fn split_line(line: &str, max_chars: usize) -> Vec<Chunk> {
    let mut pieces = Vec::new();
    let mut current: Option<Chunk> = None;
    let mut current_len = 0;
    let mut gap = String::new();

    for (word, trailing) in words_with_gaps(line) {
        let word_len = word.chars().count();

        if word_len > max_chars {
            pieces.extend(current.take());
            let chars: Vec<char> = word.chars().collect();
            for (index, part) in chars.chunks(max_chars).enumerate() {
                pieces.push(Chunk {
                    text: part.iter().collect(),
                    joint: Joint::Inline(if index == 0 {
                        gap.clone()
                    } else {
                        String::new()
                    }),
                });
            }
            current_len = 0;
        } else {
            let gap_len = gap.chars().count();
            let fits = current.is_some() && current_len + gap_len + word_len <= max_chars;
            if fits {
                if let Some(chunk) = current.as_mut() {
                    chunk.text.push_str(&gap);
                    chunk.text.push_str(word);
                    current_len += gap_len + word_len;
                }
            } else {
                pieces.extend(current.take());
                current = Some(Chunk {
                    text: word.to_string(),
                    joint: Joint::Inline(gap.clone()),
                });
                current_len = word_len;
            }
        }

        gap = trailing.to_string();
    }

    pieces.extend(current);
    pieces
}

/// 拆成(单词, 其后的空白)；行首与行尾的空白附在首尾单词上
fn words_with_gaps(line: &str) -> Vec<(&str, &str)> {
    let body_start = line.len() - line.trim_start().len();
    let mut pairs = Vec::new();
    let mut word_start = 0;
    let mut gap_start: Option<usize> = None;

    for (index, c) in line.char_indices().skip_while(|&(index, _)| index < body_start) {
        if c.is_whitespace() {
            if gap_start.is_none() {
                gap_start = Some(index);
            }
        } else if let Some(start) = gap_start.take() {
            pairs.push((&line[word_start..start], &line[start..index]));
            word_start = index;
        }
    }
    pairs.push((&line[word_start..], ""));
    pairs
}

/// 按各块的拼接方式还原全文
pub fn join_chunks<'a, I>(pieces: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a Joint)>,
{
    let mut joined = String::new();
    for (index, (text, joint)) in pieces.into_iter().enumerate() {
        if index > 0 {
            joined.push_str(joint.separator());
        }
        joined.push_str(text);
    }
    joined
}
