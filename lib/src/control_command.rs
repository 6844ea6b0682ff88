//! Control commands: the opcode-like markers of the compiled story format.
use strum::Display;

/// The closed set of control commands the stepper interprets, one per
/// mnemonic of the compiled JSON format.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum CommandType {
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

const EVAL_START: &str = "ev";
const EVAL_OUTPUT: &str = "out";
const EVAL_END: &str = "/ev";
const DUPLICATE: &str = "du";
const POP_EVALUATED_VALUE: &str = "pop";
const POP_FUNCTION: &str = "~ret";
const POP_TUNNEL: &str = "->->";
const BEGIN_STRING: &str = "str";
const END_STRING: &str = "/str";
const NO_OP: &str = "nop";
const CHOICE_COUNT: &str = "choiceCnt";
const TURNS: &str = "turn";
const TURNS_SINCE: &str = "turns";
const READ_COUNT: &str = "readc";
const RANDOM: &str = "rnd";
const SEED_RANDOM: &str = "srnd";
const VISIT_INDEX: &str = "visit";
const SEQUENCE_SHUFFLE_INDEX: &str = "seq";
const START_THREAD: &str = "thread";
const DONE: &str = "done";
const END: &str = "end";
const LIST_FROM_INT: &str = "listInt";
const LIST_RANGE: &str = "range";
const LIST_RANDOM: &str = "lrnd";
const BEGIN_TAG: &str = "#";
const END_TAG: &str = "/#";

impl CommandType {
    pub fn new_from_name(name: &str) -> Option<CommandType> {
        let command = match name {
            EVAL_START => CommandType::EvalStart,
            EVAL_OUTPUT => CommandType::EvalOutput,
            EVAL_END => CommandType::EvalEnd,
            DUPLICATE => CommandType::Duplicate,
            POP_EVALUATED_VALUE => CommandType::PopEvaluatedValue,
            POP_FUNCTION => CommandType::PopFunction,
            POP_TUNNEL => CommandType::PopTunnel,
            BEGIN_STRING => CommandType::BeginString,
            END_STRING => CommandType::EndString,
            NO_OP => CommandType::NoOp,
            CHOICE_COUNT => CommandType::ChoiceCount,
            TURNS => CommandType::Turns,
            TURNS_SINCE => CommandType::TurnsSince,
            READ_COUNT => CommandType::ReadCount,
            RANDOM => CommandType::Random,
            SEED_RANDOM => CommandType::SeedRandom,
            VISIT_INDEX => CommandType::VisitIndex,
            SEQUENCE_SHUFFLE_INDEX => CommandType::SequenceShuffleIndex,
            START_THREAD => CommandType::StartThread,
            DONE => CommandType::Done,
            END => CommandType::End,
            LIST_FROM_INT => CommandType::ListFromInt,
            LIST_RANGE => CommandType::ListRange,
            LIST_RANDOM => CommandType::ListRandom,
            BEGIN_TAG => CommandType::BeginTag,
            END_TAG => CommandType::EndTag,
            _ => return None,
        };

        Some(command)
    }

    pub fn get_name(&self) -> &'static str {
        match self {
            CommandType::EvalStart => EVAL_START,
            CommandType::EvalOutput => EVAL_OUTPUT,
            CommandType::EvalEnd => EVAL_END,
            CommandType::Duplicate => DUPLICATE,
            CommandType::PopEvaluatedValue => POP_EVALUATED_VALUE,
            CommandType::PopFunction => POP_FUNCTION,
            CommandType::PopTunnel => POP_TUNNEL,
            CommandType::BeginString => BEGIN_STRING,
            CommandType::EndString => END_STRING,
            CommandType::NoOp => NO_OP,
            CommandType::ChoiceCount => CHOICE_COUNT,
            CommandType::Turns => TURNS,
            CommandType::TurnsSince => TURNS_SINCE,
            CommandType::ReadCount => READ_COUNT,
            CommandType::Random => RANDOM,
            CommandType::SeedRandom => SEED_RANDOM,
            CommandType::VisitIndex => VISIT_INDEX,
            CommandType::SequenceShuffleIndex => SEQUENCE_SHUFFLE_INDEX,
            CommandType::StartThread => START_THREAD,
            CommandType::Done => DONE,
            CommandType::End => END,
            CommandType::ListFromInt => LIST_FROM_INT,
            CommandType::ListRange => LIST_RANGE,
            CommandType::ListRandom => LIST_RANDOM,
            CommandType::BeginTag => BEGIN_TAG,
            CommandType::EndTag => END_TAG,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnemonic_round_trip() {
        for name in [
            "ev", "out", "/ev", "du", "pop", "~ret", "->->", "str", "/str", "nop", "choiceCnt",
            "turn", "turns", "readc", "rnd", "srnd", "visit", "seq", "thread", "done", "end",
            "listInt", "range", "lrnd", "#", "/#",
        ] {
            let command = CommandType::new_from_name(name).unwrap();
            assert_eq!(name, command.get_name());
        }

        assert!(CommandType::new_from_name("bogus").is_none());
    }
}
