//! REPLコマンド

/// REPLコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 名前で関数を分類
    Query(String),
    /// アドレスを含む関数を分類
    At(String),
    /// 呼び出し後の r3 の値から戻り値の位置を評価（関数名, r3）
    Eval(String, String),
    /// 関数一覧（パターンで絞り込み）
    List(Option<String>),
    /// ヘルプ表示
    Help,
    /// 終了
    Quit,
}

impl Command {
    /// コマンド文字列をパースする
    pub fn parse(input: &str) -> Option<Self> {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let (&head, rest) = parts.split_first()?;

        match head {
            "query" | "q" if !rest.is_empty() => Some(Command::Query(rest.join(" "))),
            "at" | "a" if rest.len() == 1 => Some(Command::At(rest[0].to_string())),
            "eval" | "e" if rest.len() == 2 => {
                Some(Command::Eval(rest[0].to_string(), rest[1].to_string()))
            }
            "list" | "ls" | "l" => Some(Command::List(
                (!rest.is_empty()).then(|| rest.join(" ")),
            )),
            "help" | "h" | "?" => Some(Command::Help),
            "quit" | "exit" => Some(Command::Quit),
            _ => None,
        }
    }
}
