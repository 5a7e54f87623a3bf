//! The closed opcode enumeration.
//!
//! One stable identifier namespace shared with the scheduler and machine
//! lowering: mid-end operations (constants, arithmetic, relations, control,
//! memory, interprocedural, source-level declarations and accesses), the
//! `Dlx*` target tier, and the [`Opcode::Dead`] sentinel.
//!
//! Groupings that the property and reducer layers dispatch on (binary ops,
//! control points, global values, ...) are classification predicates on the
//! concrete opcode; there are no synthetic grouping variants in the enum.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opcode of a node. Closed set; `Dlx*` variants belong to the target
/// machine tier and are only constructed by machine lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    None,

    // -- Constants (pooled) --
    ConstantInt,
    ConstantStr,

    // -- Binary arithmetic and relations --
    BinAdd,
    BinSub,
    BinMul,
    BinDiv,
    BinLe,
    BinLt,
    BinGe,
    BinGt,
    BinEq,
    BinNe,

    // -- Control --
    Start,
    End,
    If,
    IfTrue,
    IfFalse,
    Merge,
    Loop,
    Return,
    Phi,
    EffectMerge,

    // -- Memory --
    Alloca,
    MemLoad,
    MemStore,

    // -- Interprocedural --
    Call,
    FunctionStub,
    Argument,

    // -- Source-level declarations and accesses --
    SrcVarDecl,
    SrcArrayDecl,
    SrcVarAccess,
    SrcArrayAccess,
    SrcAssignStmt,
    SrcInitialArray,

    // -- Sentinel --
    Dead,

    // -- DLX machine tier --
    DlxAdd,
    DlxAddI,
    DlxSub,
    DlxSubI,
    DlxMul,
    DlxMulI,
    DlxDiv,
    DlxDivI,
    DlxCmp,
    DlxCmpI,
    DlxLdw,
    DlxLdx,
    DlxStw,
    DlxStx,
    DlxBeq,
    DlxBne,
    DlxBle,
    DlxBlt,
    DlxBge,
    DlxBgt,
    DlxBra,
    DlxJsr,
    DlxRet,
}

impl Opcode {
    /// Printable name of this opcode.
    pub fn name(self) -> &'static str {
        match self {
            Opcode::None => "None",
            Opcode::ConstantInt => "ConstantInt",
            Opcode::ConstantStr => "ConstantStr",
            Opcode::BinAdd => "BinAdd",
            Opcode::BinSub => "BinSub",
            Opcode::BinMul => "BinMul",
            Opcode::BinDiv => "BinDiv",
            Opcode::BinLe => "BinLe",
            Opcode::BinLt => "BinLt",
            Opcode::BinGe => "BinGe",
            Opcode::BinGt => "BinGt",
            Opcode::BinEq => "BinEq",
            Opcode::BinNe => "BinNe",
            Opcode::Start => "Start",
            Opcode::End => "End",
            Opcode::If => "If",
            Opcode::IfTrue => "IfTrue",
            Opcode::IfFalse => "IfFalse",
            Opcode::Merge => "Merge",
            Opcode::Loop => "Loop",
            Opcode::Return => "Return",
            Opcode::Phi => "Phi",
            Opcode::EffectMerge => "EffectMerge",
            Opcode::Alloca => "Alloca",
            Opcode::MemLoad => "MemLoad",
            Opcode::MemStore => "MemStore",
            Opcode::Call => "Call",
            Opcode::FunctionStub => "FunctionStub",
            Opcode::Argument => "Argument",
            Opcode::SrcVarDecl => "SrcVarDecl",
            Opcode::SrcArrayDecl => "SrcArrayDecl",
            Opcode::SrcVarAccess => "SrcVarAccess",
            Opcode::SrcArrayAccess => "SrcArrayAccess",
            Opcode::SrcAssignStmt => "SrcAssignStmt",
            Opcode::SrcInitialArray => "SrcInitialArray",
            Opcode::Dead => "Dead",
            Opcode::DlxAdd => "DlxAdd",
            Opcode::DlxAddI => "DlxAddI",
            Opcode::DlxSub => "DlxSub",
            Opcode::DlxSubI => "DlxSubI",
            Opcode::DlxMul => "DlxMul",
            Opcode::DlxMulI => "DlxMulI",
            Opcode::DlxDiv => "DlxDiv",
            Opcode::DlxDivI => "DlxDivI",
            Opcode::DlxCmp => "DlxCmp",
            Opcode::DlxCmpI => "DlxCmpI",
            Opcode::DlxLdw => "DlxLdw",
            Opcode::DlxLdx => "DlxLdx",
            Opcode::DlxStw => "DlxStw",
            Opcode::DlxStx => "DlxStx",
            Opcode::DlxBeq => "DlxBeq",
            Opcode::DlxBne => "DlxBne",
            Opcode::DlxBle => "DlxBle",
            Opcode::DlxBlt => "DlxBlt",
            Opcode::DlxBge => "DlxBge",
            Opcode::DlxBgt => "DlxBgt",
            Opcode::DlxBra => "DlxBra",
            Opcode::DlxJsr => "DlxJsr",
            Opcode::DlxRet => "DlxRet",
        }
    }

    /// Returns `true` for the ten trivial binary operations
    /// (arithmetic and relations).
    pub fn is_bin_op(self) -> bool {
        matches!(
            self,
            Opcode::BinAdd
                | Opcode::BinSub
                | Opcode::BinMul
                | Opcode::BinDiv
                | Opcode::BinLe
                | Opcode::BinLt
                | Opcode::BinGe
                | Opcode::BinGt
                | Opcode::BinEq
                | Opcode::BinNe
        )
    }

    /// Returns `true` for binary operations whose operands may be swapped.
    pub fn is_commutative_bin_op(self) -> bool {
        matches!(
            self,
            Opcode::BinAdd | Opcode::BinMul | Opcode::BinEq | Opcode::BinNe
        )
    }

    /// Returns `true` for the six relational binary operations.
    pub fn is_relation(self) -> bool {
        matches!(
            self,
            Opcode::BinLe
                | Opcode::BinLt
                | Opcode::BinGe
                | Opcode::BinGt
                | Opcode::BinEq
                | Opcode::BinNe
        )
    }

    /// Control-dependency points: the nodes a scheduler pins blocks on.
    pub fn is_ctrl_point(self) -> bool {
        matches!(
            self,
            Opcode::If
                | Opcode::IfTrue
                | Opcode::IfFalse
                | Opcode::Merge
                | Opcode::Start
                | Opcode::End
                | Opcode::Return
                | Opcode::Loop
        )
    }

    /// Branch projections of an `If`.
    pub fn is_if_branch(self) -> bool {
        matches!(self, Opcode::IfTrue | Opcode::IfFalse)
    }

    /// Nodes that live outside any single function and survive trimming.
    pub fn is_global_value(self) -> bool {
        matches!(
            self,
            Opcode::ConstantStr
                | Opcode::ConstantInt
                | Opcode::Start
                | Opcode::End
                | Opcode::Dead
                | Opcode::FunctionStub
        )
    }

    /// Compile-time constant values (including the dead sentinel).
    pub fn is_constant_value(self) -> bool {
        matches!(self, Opcode::ConstantStr | Opcode::ConstantInt | Opcode::Dead)
    }

    /// Memory access operations.
    pub fn is_mem_op(self) -> bool {
        matches!(self, Opcode::MemLoad | Opcode::MemStore)
    }

    /// Region terminators.
    pub fn is_terminate(self) -> bool {
        matches!(self, Opcode::If | Opcode::Return)
    }

    /// Source-level variable or array declarations.
    pub fn is_src_decl(self) -> bool {
        matches!(self, Opcode::SrcVarDecl | Opcode::SrcArrayDecl)
    }

    /// Source-level designator accesses (variable or array reads).
    pub fn is_desig_access(self) -> bool {
        matches!(self, Opcode::SrcVarAccess | Opcode::SrcArrayAccess)
    }

    /// Returns `true` for target machine opcodes.
    pub fn is_machine_op(self) -> bool {
        matches!(
            self,
            Opcode::DlxAdd
                | Opcode::DlxAddI
                | Opcode::DlxSub
                | Opcode::DlxSubI
                | Opcode::DlxMul
                | Opcode::DlxMulI
                | Opcode::DlxDiv
                | Opcode::DlxDivI
                | Opcode::DlxCmp
                | Opcode::DlxCmpI
                | Opcode::DlxLdw
                | Opcode::DlxLdx
                | Opcode::DlxStw
                | Opcode::DlxStx
                | Opcode::DlxBeq
                | Opcode::DlxBne
                | Opcode::DlxBle
                | Opcode::DlxBlt
                | Opcode::DlxBge
                | Opcode::DlxBgt
                | Opcode::DlxBra
                | Opcode::DlxJsr
                | Opcode::DlxRet
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
