//! Dead code elimination: drops every instruction unreachable from `main`.

use super::{OptimizeError, OptimizerPass, rebuild};
use crate::bytecode::{Bytecode, Opcode};

#[derive(Debug, Clone, Copy, Default)]
pub struct DeadCodeElimination;

impl OptimizerPass for DeadCodeElimination {
    fn name(&self) -> &'static str {
        "dead-code"
    }

    fn optimize(&self, bytecode: Bytecode) -> Result<Bytecode, OptimizeError> {
        let reachable = reachable(&bytecode)?;
        let (instructions, labels) = bytecode.into_parts();
        let before = instructions.len();
        let surviving: Vec<_> = instructions
            .into_iter()
            .enumerate()
            .filter(|(index, _)| reachable[*index])
            .map(|(index, instruction)| (instruction, index))
            .collect();
        log::debug!("dead-code: removed {} instruction(s)", before - surviving.len());
        Ok(rebuild(surviving, &labels))
    }
}

/// Marks every instruction some path from the entry label can execute.
///
/// `return` ends a path, `jmp` has only its target, `jz` and `call` have both
/// their target and the next instruction.
fn reachable(bytecode: &Bytecode) -> Result<Vec<bool>, OptimizeError> {
    let entry = bytecode.entry().ok_or(OptimizeError::MissingEntry)?;
    let instructions = bytecode.instructions();
    let mut visited = vec![false; instructions.len()];
    let mut work_list = vec![entry];

    while let Some(ip) = work_list.pop() {
        let Some(instruction) = instructions.get(ip) else {
            // fell off the end or reached a trailing label
            continue;
        };
        if visited[ip] {
            continue;
        }
        visited[ip] = true;

        let opcode = instruction.opcode();
        let target = || {
            let label = instruction.arg(0).unwrap_or_default();
            bytecode
                .labels()
                .get(label)
                .ok_or_else(|| OptimizeError::UnresolvedLabel {
                    label: label.to_owned(),
                    ip,
                })
        };
        match opcode {
            Opcode::Return => {}
            Opcode::Jmp => work_list.push(target()?),
            Opcode::Jz | Opcode::Call => {
                work_list.push(target()?);
                work_list.push(ip + 1);
            }
            _ => work_list.push(ip + 1),
        }
    }

    Ok(visited)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::bytecode::{LabelTable, load};

    fn eliminate(text: &str) -> Bytecode {
        DeadCodeElimination.optimize(load(text).unwrap()).unwrap()
    }

    #[test]
    fn code_after_return_and_jmp_is_removed() {
        let code = eliminate("main:\n push 1\n print\n return 0\n push 2\n print\n");
        assert_eq!(code.to_string(), "main:\n    push 1\n    print\n    return 0\n");

        let code = eliminate("main:\n jmp end\n push 2\n print\nend:\n push 3\n print\n");
        assert_eq!(code.to_string(), "main:\n    jmp end\nend:\n    push 3\n    print\n");
        assert_eq!(code.labels().get("end"), Some(1));
    }

    #[test]
    fn uncalled_functions_go_but_their_labels_stay() {
        let code = eliminate("unused:\n push 1\n return 1\nmain:\n push 2\n print\n return 0\n");
        assert_eq!(code.len(), 3);
        assert_eq!(code.labels().get("main"), Some(0));
        assert_eq!(code.labels().get("unused"), Some(0), "removed block's label is re-indexed, not dropped");
    }

    #[test]
    fn both_branch_edges_are_followed() {
        let text = "main:\n push 0\n jz else\n push 1\n print\n jmp done\nelse:\n push 2\n print\ndone:\n call f\n return 0\n\
                    f:\n return 0\n";
        let code = eliminate(text);
        assert_eq!(code.len(), 10, "everything is reachable:\n{code}");
    }

    #[test]
    fn calls_keep_their_return_site() {
        let code = eliminate("main:\n call f\n push 1\n print\n return 0\nf:\n return 0\n");
        assert_eq!(code.len(), 5);
    }

    #[test]
    fn errors() {
        let err = DeadCodeElimination
            .optimize(load("main:\n jmp nowhere\n").unwrap())
            .unwrap_err();
        assert_eq!(
            err,
            OptimizeError::UnresolvedLabel {
                label: "nowhere".to_owned(),
                ip: 0
            }
        );

        let orphan = Bytecode::new(vec![], LabelTable::new());
        assert_eq!(DeadCodeElimination.optimize(orphan).unwrap_err(), OptimizeError::MissingEntry);
    }
}
