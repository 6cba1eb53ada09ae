/// Korean part-of-speech labels as printed on the site, with their Japanese rendering.
const POS_TABLE: &[(&str, &str)] = &[
    ("명사", "名詞"),
    ("대명사", "代名詞"),
    ("형용사", "形容詞"),
    ("동사", "動詞"),
    ("자동사", "自動詞"),
    ("타동사", "他動詞"),
    ("부사", "副詞"),
    ("관용구", "慣用句"),
    ("관형사•명사", "冠形詞 / 名詞"),
    ("명사·하다형 자동사", "名詞 / ハダ形 自動詞"),
    ("명사·하다형 타동사", "名詞 / ハダ形 他動詞"),
    ("명사·하다형 자·타동사", "名詞 / ハダ形 自動詞,他動詞"),
    ("명사·하다형 형용사", "名詞 / ハダ形 形容詞"),
    ("보조동사][여 불규칙활용", "補助動詞, 여 不規則活用"),
    ("보조형용사][여 불규칙활용", "補助形容詞, 여 不規則活用"),
    ("타동사·여 불규칙활용", "他動詞, 여 不規則活用"),
];

/// Map a label through the table; anything unknown passes through unchanged.
pub fn normalize(pos: &str) -> String {
    POS_TABLE
        .iter()
        .find(|(ko, _)| *ko == pos)
        .map(|(_, ja)| ja.to_string())
        .unwrap_or_else(|| pos.to_string())
}
