//! Drives all decode stages over one demo.
//!
//! [`EventStream`] is the lazy form: a forward-only iterator of
//! [`DomainEvent`]s. [`parse`] runs it to the end and collects everything
//! the analysis needs into an [`Output`].

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::{
    container::{Container, DemoHeader, Frame, FrameIterator, FrameKind},
    entities::{Reconstructor, WorldSnapshot},
    events::{DomainEvent, EventExtractor},
    message::{Message, MessageDecoder, StringTables},
    types::{Team, UserId},
    DemoError,
};

/// String table mapping user ids to player names.
pub const USERINFO_TABLE: &str = "userinfo";

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Player {
    pub name: String,
    pub xuid: u64,
    /// Last team the player was seen on
    pub team: Team,
}

#[derive(Debug)]
pub struct Output {
    pub header: DemoHeader,
    pub events: Vec<DomainEvent>,
    pub player_info: BTreeMap<UserId, Player>,
    /// Entity state after the last frame
    pub final_state: WorldSnapshot,
    pub string_tables: StringTables,
    pub frames: usize,
    pub last_tick: u32,
    /// Entities ignored because their class was never announced
    pub skipped_entities: BTreeSet<u32>,
    pub skipped_messages: usize,
}

pub struct EventStream<'b> {
    frames: FrameIterator<'b>,
    decoder: MessageDecoder,
    reconstructor: Reconstructor,
    extractor: EventExtractor,
    pending: VecDeque<DomainEvent>,
    connected: BTreeMap<UserId, (String, u64)>,
    skipped_entities: BTreeSet<u32>,
    frame_count: usize,
    last_tick: u32,
    done: bool,
}

impl<'b> EventStream<'b> {
    pub fn new(container: &Container<'b>) -> Self {
        Self::from_frames(container.frames())
    }

    pub fn from_frames(frames: FrameIterator<'b>) -> Self {
        Self {
            frames,
            decoder: MessageDecoder::new(),
            reconstructor: Reconstructor::new(),
            extractor: EventExtractor::new(),
            pending: VecDeque::new(),
            connected: BTreeMap::new(),
            skipped_entities: BTreeSet::new(),
            frame_count: 0,
            last_tick: 0,
            done: false,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn last_tick(&self) -> u32 {
        self.last_tick
    }

    pub fn reconstructor(&self) -> &Reconstructor {
        &self.reconstructor
    }

    fn handle_frame(&mut self, frame: Frame<'_>) -> Result<(), DemoError> {
        let _guard = tracing::debug_span!("frame", kind = ?frame.kind, tick = frame.tick).entered();

        self.frame_count += 1;
        self.last_tick = self.last_tick.max(frame.tick);

        for message in self.decoder.decode(&frame)? {
            match message {
                Message::ServerClasses(classes) => {
                    tracing::debug!(count = classes.len(), "Registering server classes");
                    self.reconstructor.register_classes(classes);
                }
                Message::EntityDeltas(deltas) => {
                    for delta in deltas.iter() {
                        match self.reconstructor.apply(delta) {
                            Ok(()) => {}
                            Err(DemoError::UnknownEntityClass {
                                entity_id,
                                class_id,
                            }) => {
                                tracing::warn!(entity_id, class_id, "Skipping entity of unknown class");
                                self.skipped_entities.insert(entity_id);
                            }
                            Err(e) => return Err(e),
                        }
                    }
                }
                Message::GameEvent(event) => {
                    if let Some(domain_event) = self.extractor.extract(frame.tick, &event) {
                        if let DomainEvent::PlayerConnected(connected) = &domain_event {
                            self.connected.insert(
                                connected.user_id,
                                (connected.name.clone(), connected.steam_id),
                            );
                        }
                        self.pending.push_back(domain_event);
                    }
                }
                Message::UserCommand(command) => {
                    self.extractor.observe_user_command(&command);
                }
                Message::ConsoleCommand(_) => {}
            }
        }

        if frame.kind == FrameKind::Packet {
            self.extractor
                .observe_snapshot(self.reconstructor.snapshot(frame.tick));
        }

        Ok(())
    }

    /// Collects the per-demo state once the stream has been drained.
    pub fn finish(self, header: DemoHeader, events: Vec<DomainEvent>) -> Output {
        let final_state = self.reconstructor.snapshot(self.last_tick);
        let skipped_messages = self.decoder.skipped_messages();
        let string_tables = self.decoder.into_string_tables();

        let mut ids: BTreeSet<UserId> = self.connected.keys().copied().collect();
        ids.extend(self.extractor.teams().keys().copied());
        ids.extend(final_state.players.iter().map(|p| p.user_id));
        if let Some(table) = string_tables.get(USERINFO_TABLE) {
            ids.extend(table.iter().map(|(index, _)| UserId(index as i32)));
        }

        let player_info = ids
            .into_iter()
            .map(|id| {
                let connected = self.connected.get(&id);
                let name = connected
                    .map(|(name, _)| name.clone())
                    .filter(|name| !name.is_empty())
                    .or_else(|| {
                        string_tables
                            .get(USERINFO_TABLE)
                            .and_then(|t| t.get(id.0 as u32))
                            .filter(|name| !name.is_empty())
                            .map(|name| name.to_owned())
                    })
                    .unwrap_or_else(|| format!("Player {}", id.0));

                let player = Player {
                    name,
                    xuid: connected.map(|(_, xuid)| *xuid).unwrap_or(0),
                    team: self
                        .extractor
                        .teams()
                        .get(&id)
                        .copied()
                        .unwrap_or(Team::Unassigned),
                };
                (id, player)
            })
            .collect();

        Output {
            header,
            events,
            player_info,
            final_state,
            string_tables,
            frames: self.frame_count,
            last_tick: self.last_tick,
            skipped_entities: self.skipped_entities,
            skipped_messages,
        }
    }
}

impl<'b> Iterator for EventStream<'b> {
    type Item = Result<DomainEvent, DemoError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if self.done {
                return None;
            }

            let frame = match self.frames.next() {
                Some(Ok(f)) => f,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    return None;
                }
            };

            if let Err(e) = self.handle_frame(frame) {
                self.done = true;
                self.pending.clear();
                return Some(Err(e));
            }
        }
    }
}

/// Decodes a whole demo.
///
/// Either every frame decodes or the first fatal error is returned, there is
/// no partial output.
pub fn parse(buf: &[u8]) -> Result<Output, DemoError> {
    let container = Container::parse(buf)?;

    let mut stream = EventStream::new(&container);
    let events = stream.by_ref().collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        frames = stream.frame_count(),
        events = events.len(),
        last_tick = stream.last_tick(),
        "Decoded demo"
    );

    Ok(stream.finish(container.header, events))
}
