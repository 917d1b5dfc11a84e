//! Content node kinds.
//!
//! Every node the runtime can execute is one variant of [`Node`]. Nested
//! containers are referenced by [`ContainerId`] into the graph arena, never
//! owned inline, so diverts and parents stay plain paths.

use indexmap::IndexMap;

use crate::{ContainerId, Path};

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Text(String),
    Tag(String),
    Glue,
    Divert(Divert),
    ChoicePoint(ChoicePoint),
    Control(ControlCommand),
    VariableReference(String),
    ReadCount(Path),
    VariableAssignment(VariableAssignment),
    NativeCall(NativeOp),
    Constant(Literal),
    Container(ContainerId),
    Void,
}

impl Node {
    pub fn as_container(&self) -> Option<ContainerId> {
        match self {
            Node::Container(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_newline(&self) -> bool {
        matches!(self, Node::Text(s) if s == "\n")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PushPopType {
    Tunnel,
    Function,
    FunctionEvaluationFromGame,
}

impl PushPopType {
    pub fn as_int(self) -> i64 {
        match self {
            PushPopType::Tunnel => 0,
            PushPopType::Function => 1,
            PushPopType::FunctionEvaluationFromGame => 2,
        }
    }

    pub fn from_int(i: i64) -> Option<Self> {
        match i {
            0 => Some(PushPopType::Tunnel),
            1 => Some(PushPopType::Function),
            2 => Some(PushPopType::FunctionEvaluationFromGame),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DivertTarget {
    Path(Path),
    Variable(String),
    External { name: String, args: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Divert {
    pub target: DivertTarget,
    pub is_conditional: bool,
    /// Frame type pushed before jumping, for function calls and tunnels.
    pub push: Option<PushPopType>,
}

impl Divert {
    pub fn is_external(&self) -> bool {
        matches!(self.target, DivertTarget::External { .. })
    }
}

/// Choice point flags as packed in the `flg` field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChoiceFlags {
    pub has_condition: bool,
    pub has_start_content: bool,
    pub has_choice_only_content: bool,
    /// Also the fallback choice: never displayed, taken when nothing else is.
    pub invisible_default: bool,
    pub only_once: bool,
}

impl ChoiceFlags {
    pub fn from_bits(bits: u32) -> Self {
        Self {
            has_condition: bits & 1 != 0,
            has_start_content: bits & 2 != 0,
            has_choice_only_content: bits & 4 != 0,
            invisible_default: bits & 8 != 0,
            only_once: bits & 16 != 0,
        }
    }

    pub fn bits(self) -> u32 {
        let mut b = 0;
        if self.has_condition {
            b |= 1;
        }
        if self.has_start_content {
            b |= 2;
        }
        if self.has_choice_only_content {
            b |= 4;
        }
        if self.invisible_default {
            b |= 8;
        }
        if self.only_once {
            b |= 16;
        }
        b
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChoicePoint {
    pub path_on_choice: Path,
    pub flags: ChoiceFlags,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableAssignment {
    pub name: String,
    pub is_global: bool,
    pub is_new_declaration: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControlCommand {
    EvalStart,
    EvalOutput,
    EvalEnd,
    Duplicate,
    PopEvaluatedValue,
    PopFunction,
    PopTunnel,
    BeginString,
    EndString,
    NoOp,
    ChoiceCount,
    Turns,
    TurnsSince,
    ReadCount,
    Random,
    SeedRandom,
    VisitIndex,
    SequenceShuffleIndex,
    StartThread,
    Done,
    End,
    ListFromInt,
    ListRange,
    ListRandom,
    BeginTag,
    EndTag,
}

impl ControlCommand {
    pub fn from_token(s: &str) -> Option<Self> {
        use ControlCommand::*;
        Some(match s {
            "ev" => EvalStart,
            "out" => EvalOutput,
            "/ev" => EvalEnd,
            "du" => Duplicate,
            "pop" => PopEvaluatedValue,
            "~ret" => PopFunction,
            "->->" => PopTunnel,
            "str" => BeginString,
            "/str" => EndString,
            "nop" => NoOp,
            "choiceCnt" => ChoiceCount,
            "turn" => Turns,
            "turns" => TurnsSince,
            "readc" => ReadCount,
            "rnd" => Random,
            "srnd" => SeedRandom,
            "visit" => VisitIndex,
            "seq" => SequenceShuffleIndex,
            "thread" => StartThread,
            "done" => Done,
            "end" => End,
            "listInt" => ListFromInt,
            "range" => ListRange,
            "lrnd" => ListRandom,
            "#" => BeginTag,
            "/#" => EndTag,
            _ => return None,
        })
    }

    pub fn token(self) -> &'static str {
        use ControlCommand::*;
        match self {
            EvalStart => "ev",
            EvalOutput => "out",
            EvalEnd => "/ev",
            Duplicate => "du",
            PopEvaluatedValue => "pop",
            PopFunction => "~ret",
            PopTunnel => "->->",
            BeginString => "str",
            EndString => "/str",
            NoOp => "nop",
            ChoiceCount => "choiceCnt",
            Turns => "turn",
            TurnsSince => "turns",
            ReadCount => "readc",
            Random => "rnd",
            SeedRandom => "srnd",
            VisitIndex => "visit",
            SequenceShuffleIndex => "seq",
            StartThread => "thread",
            Done => "done",
            End => "end",
            ListFromInt => "listInt",
            ListRange => "range",
            ListRandom => "lrnd",
            BeginTag => "#",
            EndTag => "/#",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NativeOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
    Negate,
    Equal,
    NotEqual,
    Greater,
    Less,
    GreaterEq,
    LessEq,
    Not,
    And,
    Or,
    Min,
    Max,
    Pow,
    Floor,
    Ceiling,
    Int,
    Float,
    Has,
    HasNot,
    Intersect,
    ListMin,
    ListMax,
    ListAll,
    ListCount,
    ListValue,
    ListInvert,
}

impl NativeOp {
    pub fn from_token(s: &str) -> Option<Self> {
        use NativeOp::*;
        Some(match s {
            "+" => Add,
            "-" => Subtract,
            "*" => Multiply,
            "/" => Divide,
            "%" => Mod,
            "_" => Negate,
            "==" => Equal,
            "!=" => NotEqual,
            ">" => Greater,
            "<" => Less,
            ">=" => GreaterEq,
            "<=" => LessEq,
            "!" => Not,
            "&&" => And,
            "||" => Or,
            "MIN" => Min,
            "MAX" => Max,
            "POW" => Pow,
            "FLOOR" => Floor,
            "CEILING" => Ceiling,
            "INT" => Int,
            "FLOAT" => Float,
            "?" => Has,
            "!?" => HasNot,
            "L^" => Intersect,
            "LIST_MIN" => ListMin,
            "LIST_MAX" => ListMax,
            "LIST_ALL" => ListAll,
            "LIST_COUNT" => ListCount,
            "LIST_VALUE" => ListValue,
            "LIST_INVERT" => ListInvert,
            _ => return None,
        })
    }

    pub fn token(self) -> &'static str {
        use NativeOp::*;
        match self {
            Add => "+",
            Subtract => "-",
            Multiply => "*",
            Divide => "/",
            Mod => "%",
            Negate => "_",
            Equal => "==",
            NotEqual => "!=",
            Greater => ">",
            Less => "<",
            GreaterEq => ">=",
            LessEq => "<=",
            Not => "!",
            And => "&&",
            Or => "||",
            Min => "MIN",
            Max => "MAX",
            Pow => "POW",
            Floor => "FLOOR",
            Ceiling => "CEILING",
            Int => "INT",
            Float => "FLOAT",
            Has => "?",
            HasNot => "!?",
            Intersect => "L^",
            ListMin => "LIST_MIN",
            ListMax => "LIST_MAX",
            ListAll => "LIST_ALL",
            ListCount => "LIST_COUNT",
            ListValue => "LIST_VALUE",
            ListInvert => "LIST_INVERT",
        }
    }

    pub fn arity(self) -> usize {
        use NativeOp::*;
        match self {
            Negate | Not | Floor | Ceiling | Int | Float | ListMin | ListMax | ListAll
            | ListCount | ListValue | ListInvert => 1,
            _ => 2,
        }
    }
}

/// A list literal: `"Origin.item"` keys mapped to their declared values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListLiteral {
    pub items: IndexMap<String, i64>,
    pub origins: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    DivertTarget(Path),
    VariablePointer { name: String, context_index: i64 },
    List(ListLiteral),
}
