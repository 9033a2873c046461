//! Dependency-parse trees read from CoNLL-U.
//!
//! Trees live in a flat arena: slot 0 is a synthetic root, slots 1..=n are
//! the sentence tokens by ordinal. Parent and child links are arena indices,
//! so walking upward never touches ownership.

use date_check_types::{ParseCell, SentenceParse};

use crate::error::{CheckError, CheckResult};

/// Relation carried by the synthetic root.
pub const ROOT_RELATION: &str = "<ROOT>";

#[derive(Debug, Clone)]
pub struct Token {
    /// 1-based position in the sentence; 0 for the synthetic root
    pub ord: usize,
    pub form: String,
    pub lemma: String,
    pub upos: String,
    pub deprel: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct ParseTree {
    nodes: Vec<Token>,
}

impl ParseTree {
    /// Read one sentence from a CoNLL-U block.
    pub fn from_conllu(text: &str) -> CheckResult<Self> {
        let mut nodes = vec![Token {
            ord: 0,
            form: String::new(),
            lemma: String::new(),
            upos: String::new(),
            deprel: ROOT_RELATION.to_string(),
            parent: None,
            children: Vec::new(),
        }];
        let mut heads = vec![0usize];

        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 8 {
                return Err(CheckError::ParseTree(format!(
                    "expected at least 8 columns, got {}: {line}",
                    fields.len()
                )));
            }
            // Multiword ranges (1-2) and empty nodes (1.1) are not tree tokens
            if fields[0].contains('-') || fields[0].contains('.') {
                continue;
            }
            let ord: usize = fields[0]
                .parse()
                .map_err(|_| CheckError::ParseTree(format!("bad token id '{}'", fields[0])))?;
            if ord != nodes.len() {
                return Err(CheckError::ParseTree(format!(
                    "token id {ord} out of sequence, expected {}",
                    nodes.len()
                )));
            }
            let head: usize = fields[6]
                .parse()
                .map_err(|_| CheckError::ParseTree(format!("bad head '{}' for token {ord}", fields[6])))?;

            nodes.push(Token {
                ord,
                form: fields[1].to_string(),
                lemma: fields[2].to_string(),
                upos: fields[3].to_string(),
                deprel: fields[7].to_string(),
                parent: None,
                children: Vec::new(),
            });
            heads.push(head);
        }

        let len = nodes.len();
        for ord in 1..len {
            let head = heads[ord];
            if head >= len || head == ord {
                return Err(CheckError::ParseTree(format!(
                    "token {ord} has invalid head {head}"
                )));
            }
            nodes[ord].parent = Some(head);
            nodes[head].children.push(ord);
        }

        let tree = ParseTree { nodes };
        tree.ensure_acyclic()?;
        Ok(tree)
    }

    /// Read one sentence given as ten-field rows.
    pub fn from_rows(rows: &[Vec<ParseCell>]) -> CheckResult<Self> {
        let text = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(ParseCell::as_text)
                    .collect::<Vec<_>>()
                    .join("\t")
            })
            .collect::<Vec<_>>()
            .join("\n");
        Self::from_conllu(&text)
    }

    pub fn from_parse(parse: &SentenceParse) -> CheckResult<Self> {
        match parse {
            SentenceParse::Conllu(text) => Self::from_conllu(text),
            SentenceParse::Rows(rows) => Self::from_rows(rows),
        }
    }

    fn ensure_acyclic(&self) -> CheckResult<()> {
        let len = self.nodes.len();
        for start in 1..len {
            let mut current = start;
            let mut steps = 0;
            while let Some(parent) = self.nodes[current].parent {
                current = parent;
                steps += 1;
                if steps > len {
                    return Err(CheckError::ParseTree(format!(
                        "head cycle through token {start}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn node(&self, id: usize) -> &Token {
        &self.nodes[id]
    }

    pub fn parent(&self, id: usize) -> Option<usize> {
        self.nodes[id].parent
    }

    pub fn children(&self, id: usize) -> &[usize] {
        &self.nodes[id].children
    }

    /// Sentence tokens in ordinal order, without the synthetic root.
    pub fn tokens(&self) -> &[Token] {
        &self.nodes[1..]
    }

    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Token forms joined by single spaces.
    pub fn text(&self) -> String {
        self.tokens()
            .iter()
            .map(|t| t.form.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAR_BEGAN: &str = "\
# text = Война началась в 1855 году
1\tВойна\tвойна\tNOUN\t_\t_\t2\tnsubj\t_\t_
2\tначалась\tначаться\tVERB\t_\t_\t0\troot\t_\t_
3\tв\tв\tADP\t_\t_\t5\tcase\t_\t_
4\t1855\t1855\tADJ\t_\t_\t5\tamod\t_\t_
5\tгоду\tгод\tNOUN\t_\t_\t2\tobl\t_\t_
";

    #[test]
    fn test_from_conllu_links() {
        let tree = ParseTree::from_conllu(WAR_BEGAN).unwrap();
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.node(0).deprel, ROOT_RELATION);
        assert_eq!(tree.children(0), &[2]);
        assert_eq!(tree.children(2), &[1, 5]);
        assert_eq!(tree.children(5), &[3, 4]);
        assert_eq!(tree.parent(4), Some(5));
        assert_eq!(tree.parent(0), None);
        assert_eq!(tree.node(5).lemma, "год");
        assert_eq!(tree.text(), "Война началась в 1855 году");
    }

    #[test]
    fn test_skips_multiword_and_empty_nodes() {
        let text = "1-2\tвдоль\t_\t_\t_\t_\t_\t_\t_\t_\n\
                    1\tОн\tон\tPRON\t_\t_\t2\tnsubj\t_\t_\n\
                    2\tпришел\tприйти\tVERB\t_\t_\t0\troot\t_\t_\n\
                    2.1\tсюда\t_\t_\t_\t_\t_\t_\t_\t_\n";
        let tree = ParseTree::from_conllu(text).unwrap();
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_from_rows_with_numeric_cells() {
        let row = |id: i64, form: &str, head: i64, rel: &str| {
            vec![
                ParseCell::Number(id),
                ParseCell::Text(form.to_string()),
                ParseCell::Text(form.to_lowercase()),
                ParseCell::Text("X".to_string()),
                ParseCell::Text("_".to_string()),
                ParseCell::Text("_".to_string()),
                ParseCell::Number(head),
                ParseCell::Text(rel.to_string()),
                ParseCell::Text("_".to_string()),
                ParseCell::Text("_".to_string()),
            ]
        };
        let rows = vec![row(1, "Мир", 2, "nsubj"), row(2, "наступил", 0, "root")];
        let tree = ParseTree::from_rows(&rows).unwrap();
        assert_eq!(tree.children(2), &[1]);
        assert_eq!(tree.node(1).form, "Мир");
    }

    #[test]
    fn test_rejects_head_out_of_range() {
        let text = "1\tа\tа\tX\t_\t_\t7\tdep\t_\t_\n";
        assert!(matches!(
            ParseTree::from_conllu(text),
            Err(CheckError::ParseTree(_))
        ));
    }

    #[test]
    fn test_rejects_cycle() {
        let text = "1\tа\tа\tX\t_\t_\t2\tdep\t_\t_\n2\tб\tб\tX\t_\t_\t1\tdep\t_\t_\n";
        assert!(matches!(
            ParseTree::from_conllu(text),
            Err(CheckError::ParseTree(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_sequence_ids() {
        let text = "2\tа\tа\tX\t_\t_\t0\troot\t_\t_\n";
        assert!(ParseTree::from_conllu(text).is_err());
    }
}
