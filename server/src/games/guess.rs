use crate::game::{AdmissionConflict, Game, GameFactory, SessionContext};
use async_trait::async_trait;
use rand::Rng;
use tcpgames::{probe, Command, Connection, Message};

const INTRO: &str = "Welcome player, I want you to guess a number.\n\
                     It's somewhere between (and including) 1 and 100.\n";
const PROMPT: &str = "Your guess: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    TooLow,
    TooHigh,
    Correct,
    NotANumber,
}

impl Verdict {
    fn of(guess: &str, target: i64) -> Self {
        match guess.trim().parse::<i64>() {
            Ok(guess) if guess < target => Verdict::TooLow,
            Ok(guess) if guess > target => Verdict::TooHigh,
            Ok(_) => Verdict::Correct,
            Err(_) => Verdict::NotANumber,
        }
    }

    fn reply(self) -> &'static str {
        match self {
            Verdict::TooLow => "Too low.\n",
            Verdict::TooHigh => "Too high.\n",
            Verdict::Correct => "Correct! You win!\n",
            Verdict::NotANumber => "That wasn't a valid number, try again.\n",
        }
    }
}

/// Single player guesses a number in `[1, 100]`.
#[derive(Debug, Default)]
pub struct GuessMyNumber {
    player: Option<Connection>,
    target: Option<i64>,
}

impl GuessMyNumber {
    pub fn new() -> Self {
        Self::default()
    }

    /// A game whose number is fixed instead of drawn at random.
    pub fn with_target(target: i64) -> Self {
        Self {
            player: None,
            target: Some(target),
        }
    }

    pub fn factory() -> GameFactory {
        Box::new(|| Box::new(GuessMyNumber::new()) as Box<dyn Game>)
    }
}

/// Wait for the player's next message, giving up if the session is stopped or
/// the player goes away.
async fn next_answer(player: &mut Connection, ctx: &SessionContext) -> Option<Message> {
    loop {
        if ctx.should_stop() || ctx.has_left(player.id()) {
            return None;
        }
        if let Some(message) = player.receive_message().await {
            return Some(message);
        }
        if probe::is_disconnected(player, ctx.probe_timeout()).await {
            tracing::info!(session = %ctx.id(), "Client disconnected from game.");
            ctx.player_left(player.id());
            return None;
        }
        ctx.pause().await;
    }
}

#[async_trait]
impl Game for GuessMyNumber {
    fn name(&self) -> &str {
        "Guess My Number"
    }

    fn required_players(&self) -> usize {
        1
    }

    fn admit_player(&mut self, connection: Connection) -> Result<(), AdmissionConflict> {
        if self.player.is_some() {
            return Err(AdmissionConflict(connection));
        }
        self.player = Some(connection);
        Ok(())
    }

    async fn run(&mut self, ctx: &SessionContext) {
        let Some(player) = self.player.as_mut() else {
            return;
        };
        player.send(&Message::message(INTRO)).await;

        let target = self
            .target
            .unwrap_or_else(|| rand::thread_rng().gen_range(1..=100));
        tracing::info!(session = %ctx.id(), "Our number is {}", target);

        loop {
            player.send(&Message::input(PROMPT)).await;
            let Some(answer) = next_answer(player, ctx).await else {
                return;
            };
            match answer.kind() {
                Some(Command::Bye) => {
                    tracing::info!(session = %ctx.id(), "Client left the game.");
                    ctx.player_left(player.id());
                    return;
                }
                Some(Command::Input) => {
                    let verdict = Verdict::of(answer.payload(), target);
                    player.send(&Message::message(verdict.reply())).await;
                    if verdict == Verdict::Correct {
                        return;
                    }
                }
                _ => tracing::debug!(session = %ctx.id(), ?answer, "ignoring unexpected message"),
            }
        }
    }

    fn release_players(&mut self) -> Vec<Connection> {
        self.player.take().into_iter().collect()
    }
}
