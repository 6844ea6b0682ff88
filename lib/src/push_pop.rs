/// The kind of call-stack frame a push or pop refers to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PushPopType {
    /// A tunnel call, returned from with `->->`.
    Tunnel,
    /// A function call, returned from with `~ return`.
    Function,
    /// A function evaluation started by the game, not by the ink.
    FunctionEvaluationFromGame,
}

impl PushPopType {
    pub fn from_value(value: usize) -> PushPopType {
        match value {
            0 => PushPopType::Tunnel,
            1 => PushPopType::Function,
            _ => PushPopType::FunctionEvaluationFromGame,
        }
    }

    pub fn to_value(self) -> usize {
        match self {
            PushPopType::Tunnel => 0,
            PushPopType::Function => 1,
            PushPopType::FunctionEvaluationFromGame => 2,
        }
    }
}
