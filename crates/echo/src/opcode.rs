//! The CPython 3.7-era instruction set this evaluator dispatches on.
//!
//! Numeric values match the host's own `opcode.py`/`Include/opcode.h` table
//! for that release, since `entry.rs` decodes the raw `co_code` bytes a real
//! `compile()` call hands back rather than emitting its own bytecode.

#![allow(clippy::unreadable_literal)]

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    PopTop,
    RotTwo,
    RotThree,
    DupTop,
    DupTopTwo,
    Nop,
    UnaryPositive,
    UnaryNegative,
    UnaryNot,
    UnaryInvert,
    BinaryPower,
    BinaryMultiply,
    BinaryModulo,
    BinaryAdd,
    BinarySubtract,
    BinarySubscr,
    BinaryFloorDivide,
    BinaryTrueDivide,
    InplaceFloorDivide,
    InplaceTrueDivide,
    GetAiter,
    GetAnext,
    BeforeAsyncWith,
    InplaceAdd,
    InplaceSubtract,
    InplaceMultiply,
    InplaceModulo,
    StoreSubscr,
    DeleteSubscr,
    BinaryLshift,
    BinaryRshift,
    BinaryAnd,
    BinaryXor,
    BinaryOr,
    InplacePower,
    GetIter,
    GetYieldFromIter,
    PrintExpr,
    LoadBuildClass,
    YieldFrom,
    GetAwaitable,
    InplaceLshift,
    InplaceRshift,
    InplaceAnd,
    InplaceXor,
    InplaceOr,
    BreakLoop,
    WithCleanupStart,
    WithCleanupFinish,
    ReturnValue,
    ImportStar,
    SetupAnnotations,
    YieldValue,
    PopBlock,
    EndFinally,
    PopExcept,
    ContinueLoop(u32),
    SetupLoop(u32),
    SetupExcept(u32),
    StoreName(u32),
    DeleteName(u32),
    UnpackSequence(u32),
    ForIter(u32),
    UnpackEx(u32),
    StoreAttr(u32),
    DeleteAttr(u32),
    StoreGlobal(u32),
    DeleteGlobal(u32),
    LoadConst(u32),
    LoadName(u32),
    BuildTuple(u32),
    BuildList(u32),
    BuildSet(u32),
    BuildMap(u32),
    LoadAttr(u32),
    CompareOp(u32),
    ImportName(u32),
    ImportFrom(u32),
    JumpForward(u32),
    JumpIfFalseOrPop(u32),
    JumpIfTrueOrPop(u32),
    JumpAbsolute(u32),
    PopJumpIfFalse(u32),
    PopJumpIfTrue(u32),
    LoadGlobal(u32),
    SetupFinally(u32),
    LoadFast(u32),
    StoreFast(u32),
    DeleteFast(u32),
    CallFunction(u32),
    MakeFunction(u32),
    RaiseVarargs(u32),
    BuildSlice(u32),
    LoadClosure(u32),
    LoadDeref(u32),
    StoreDeref(u32),
    DeleteDeref(u32),
    CallFunctionKw(u32),
    CallFunctionEx(u32),
    SetupWith(u32),
    ListAppend(u32),
    SetAdd(u32),
    MapAdd(u32),
    LoadClassderef(u32),
    BuildListUnpack(u32),
    BuildMapUnpack(u32),
    BuildMapUnpackWithCall(u32),
    BuildTupleUnpack(u32),
    BuildSetUnpack(u32),
    SetupAsyncWith(u32),
    FormatValue(u32),
    BuildConstKeyMap(u32),
    BuildString(u32),
    BuildTupleUnpackWithCall(u32),
    LoadMethod(u32),
    CallMethod(u32),
    /// Decoded but never left standalone: `bytecode.rs` folds `EXTENDED_ARG`
    /// into the following instruction's argument before this enum is built.
    ExtendedArg(u32),
    /// An opcode byte this crate doesn't recognize -- surfaces as an
    /// interpreter-internal error rather than a silent no-op.
    Unknown(u8, u32),
}

const HAVE_ARGUMENT: u8 = 90;

impl Opcode {
    #[must_use]
    pub fn decode(op: u8, arg: u32) -> Self {
        match op {
            1 => Self::PopTop,
            2 => Self::RotTwo,
            3 => Self::RotThree,
            4 => Self::DupTop,
            5 => Self::DupTopTwo,
            9 => Self::Nop,
            10 => Self::UnaryPositive,
            11 => Self::UnaryNegative,
            12 => Self::UnaryNot,
            15 => Self::UnaryInvert,
            19 => Self::BinaryPower,
            20 => Self::BinaryMultiply,
            22 => Self::BinaryModulo,
            23 => Self::BinaryAdd,
            24 => Self::BinarySubtract,
            25 => Self::BinarySubscr,
            26 => Self::BinaryFloorDivide,
            27 => Self::BinaryTrueDivide,
            28 => Self::InplaceFloorDivide,
            29 => Self::InplaceTrueDivide,
            50 => Self::GetAiter,
            51 => Self::GetAnext,
            52 => Self::BeforeAsyncWith,
            55 => Self::InplaceAdd,
            56 => Self::InplaceSubtract,
            57 => Self::InplaceMultiply,
            59 => Self::InplaceModulo,
            60 => Self::StoreSubscr,
            61 => Self::DeleteSubscr,
            62 => Self::BinaryLshift,
            63 => Self::BinaryRshift,
            64 => Self::BinaryAnd,
            65 => Self::BinaryXor,
            66 => Self::BinaryOr,
            67 => Self::InplacePower,
            68 => Self::GetIter,
            69 => Self::GetYieldFromIter,
            70 => Self::PrintExpr,
            71 => Self::LoadBuildClass,
            72 => Self::YieldFrom,
            73 => Self::GetAwaitable,
            75 => Self::InplaceLshift,
            76 => Self::InplaceRshift,
            77 => Self::InplaceAnd,
            78 => Self::InplaceXor,
            79 => Self::InplaceOr,
            80 => Self::BreakLoop,
            81 => Self::WithCleanupStart,
            82 => Self::WithCleanupFinish,
            83 => Self::ReturnValue,
            84 => Self::ImportStar,
            85 => Self::SetupAnnotations,
            86 => Self::YieldValue,
            87 => Self::PopBlock,
            88 => Self::EndFinally,
            89 => Self::PopExcept,
            119 => Self::ContinueLoop(arg),
            120 => Self::SetupLoop(arg),
            121 => Self::SetupExcept(arg),
            122 => Self::SetupFinally(arg),
            90 => Self::StoreName(arg),
            91 => Self::DeleteName(arg),
            92 => Self::UnpackSequence(arg),
            93 => Self::ForIter(arg),
            94 => Self::UnpackEx(arg),
            95 => Self::StoreAttr(arg),
            96 => Self::DeleteAttr(arg),
            97 => Self::StoreGlobal(arg),
            98 => Self::DeleteGlobal(arg),
            100 => Self::LoadConst(arg),
            101 => Self::LoadName(arg),
            102 => Self::BuildTuple(arg),
            103 => Self::BuildList(arg),
            104 => Self::BuildSet(arg),
            105 => Self::BuildMap(arg),
            106 => Self::LoadAttr(arg),
            107 => Self::CompareOp(arg),
            108 => Self::ImportName(arg),
            109 => Self::ImportFrom(arg),
            110 => Self::JumpForward(arg),
            111 => Self::JumpIfFalseOrPop(arg),
            112 => Self::JumpIfTrueOrPop(arg),
            113 => Self::JumpAbsolute(arg),
            114 => Self::PopJumpIfFalse(arg),
            115 => Self::PopJumpIfTrue(arg),
            116 => Self::LoadGlobal(arg),
            124 => Self::LoadFast(arg),
            125 => Self::StoreFast(arg),
            126 => Self::DeleteFast(arg),
            130 => Self::RaiseVarargs(arg),
            131 => Self::CallFunction(arg),
            132 => Self::MakeFunction(arg),
            133 => Self::BuildSlice(arg),
            135 => Self::LoadClosure(arg),
            136 => Self::LoadDeref(arg),
            137 => Self::StoreDeref(arg),
            138 => Self::DeleteDeref(arg),
            141 => Self::CallFunctionKw(arg),
            142 => Self::CallFunctionEx(arg),
            143 => Self::SetupWith(arg),
            144 => Self::ExtendedArg(arg),
            145 => Self::ListAppend(arg),
            146 => Self::SetAdd(arg),
            147 => Self::MapAdd(arg),
            148 => Self::LoadClassderef(arg),
            149 => Self::BuildListUnpack(arg),
            150 => Self::BuildMapUnpack(arg),
            151 => Self::BuildMapUnpackWithCall(arg),
            152 => Self::BuildTupleUnpack(arg),
            153 => Self::BuildSetUnpack(arg),
            154 => Self::SetupAsyncWith(arg),
            155 => Self::FormatValue(arg),
            156 => Self::BuildConstKeyMap(arg),
            157 => Self::BuildString(arg),
            158 => Self::BuildTupleUnpackWithCall(arg),
            160 => Self::LoadMethod(arg),
            161 => Self::CallMethod(arg),
            other => Self::Unknown(other, arg),
        }
    }

    #[must_use]
    pub fn has_argument(op: u8) -> bool {
        op >= HAVE_ARGUMENT
    }
}
