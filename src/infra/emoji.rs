use crate::services::TextSanitizer;

/// Removes emoji so trackers that store text in legacy encodings accept it.
pub struct EmojiStripper;

impl TextSanitizer for EmojiStripper {
    fn sanitize(&self, text: &str) -> String {
        text.chars().filter(|ch| !is_emoji(*ch)).collect()
    }
}

fn is_emoji(ch: char) -> bool {
    matches!(
        ch as u32,
        0x1F000..=0x1FAFF       // pictographs, emoticons, transport, flags
            | 0x2600..=0x27BF   // misc symbols, dingbats
            | 0x2B00..=0x2BFF   // arrows and stars
            | 0x231A..=0x231B
            | 0x23E9..=0x23FA
            | 0x200D            // zero width joiner
            | 0x20E3            // keycap
            | 0xFE0E..=0xFE0F   // variation selectors
            | 0xE0020..=0xE007F // tag sequences
            | 0x3030
            | 0x303D
            | 0x3297
            | 0x3299
    )
}
