//! Mocked user directory, categories and demo threads.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeZone, Utc};

use super::ForumState;
use crate::errors::Result;
use crate::forum::TopicAggregate;
use crate::models::{Ban, Category, QuoteSnapshot, Reply, Topic, User, UserRole};

pub const DEMO_TOPIC_ID: &str = "0b8a4a34-5c1e-4b8f-9c4e-7d2f1a3b5c6d";
pub const DEMO_REPLY_ID: &str = "6f1d2c9e-3a7b-4e5f-8d90-1b2c3d4e5f60";
pub const DEMO_NESTED_REPLY_ID: &str = "a3c5e7f9-1b2d-4f6a-8c0e-2d4f6a8c0e12";
pub const DEMO_RECOMMENDATIONS_ID: &str = "c7e9a1b3-5d7f-4a2c-9e1b-3f5a7c9e1b35";

fn member(id: &str, username: &str, display_name: &str, role: UserRole) -> User {
    User {
        id: id.to_string(),
        username: username.to_string(),
        display_name: display_name.to_string(),
        role,
        active: true,
        banned: false,
        ban: None,
    }
}

pub fn directory() -> Vec<User> {
    let mut spammer = member("5", "spamuser", "Spam User", UserRole::User);
    spammer.banned = true;
    spammer.active = false;
    spammer.ban = Some(Ban {
        reason: "Repeated spam posting".to_string(),
        banned_by: "taylor-wilson".to_string(),
        banned_at: at(1, 12, 9, 30),
        expires_at: None,
    });
    vec![
        member("1", "sarah-johnson", "Sarah Johnson", UserRole::User),
        member("2", "michael-chen", "Michael Chen", UserRole::User),
        member("3", "taylor-wilson", "Taylor Wilson", UserRole::Moderator),
        member("4", "jamie-rodriguez", "Jamie Rodriguez", UserRole::Administrator),
        spammer,
    ]
}

pub fn categories() -> Vec<Category> {
    [
        ("local-news", "Local News & Events", "Discuss the latest happenings in our community"),
        ("recommendations", "Recommendations", "Ask for and share local business recommendations"),
        ("community-projects", "Community Projects", "Collaborate on initiatives to improve our neighborhood"),
        ("buy-sell-trade", "Buy, Sell & Trade", "Local marketplace for community members"),
        ("general-discussion", "General Discussion", "Chat about anything else on your mind"),
    ]
    .into_iter()
    .map(|(id, title, description)| Category {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
    })
    .collect()
}

fn at(month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, month, day, hour, minute, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

fn tags(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|t| t.to_string()).collect()
}

const GARDEN_BODY: &str = "Hello neighbors!

I'd like to propose a community garden project for the unused space in Oak Street Park. The area behind the playground has about 2,000 square feet that could be converted into garden plots for residents.

What do you all think? Would anyone be interested in helping organize this or having a garden plot?";

const WATER_QUESTION: &str =
    "Have you thought about water access? That's usually one of the bigger challenges for community gardens.";

/// Loads the demo threads into `state`.
pub(super) fn demo_threads(state: &mut ForumState) -> Result<()> {
    let sarah = state.author("1")?;
    let michael = state.author("2")?;

    let mut garden = Topic::new(
        DEMO_TOPIC_ID.to_string(),
        "community-projects".to_string(),
        "New community garden proposal for Oak Street Park".to_string(),
        GARDEN_BODY.to_string(),
        sarah.clone(),
        tags(&["Community", "Gardening", "Parks", "Volunteering"]),
        at(1, 15, 10, 23),
    );
    garden.views = 156;
    let mut aggregate = TopicAggregate::new(garden);
    aggregate.votes_mut().seed(DEMO_TOPIC_ID, 42);

    let first = Reply::new(
        DEMO_REPLY_ID.to_string(),
        DEMO_TOPIC_ID.to_string(),
        michael.clone(),
        format!(
            "This is a fantastic idea, Sarah! I'd definitely be interested in having a plot.\n\n{}",
            WATER_QUESTION
        ),
        at(1, 15, 11, 45),
    );
    aggregate.add_reply(None, first)?;
    aggregate.votes_mut().seed(DEMO_REPLY_ID, 18);

    let mut answer = Reply::new(
        DEMO_NESTED_REPLY_ID.to_string(),
        DEMO_TOPIC_ID.to_string(),
        sarah.clone(),
        "Great point about water access, Michael! The park has a water spigot near the maintenance shed that we could potentially tap into.".to_string(),
        at(1, 15, 12, 30),
    );
    answer.quoted_reply = Some(QuoteSnapshot {
        id: DEMO_REPLY_ID.to_string(),
        author: michael.display_name.clone(),
        excerpt: WATER_QUESTION.to_string(),
    });
    aggregate.add_reply(Some(DEMO_REPLY_ID), answer)?;
    aggregate.votes_mut().seed(DEMO_NESTED_REPLY_ID, 12);
    state.insert_aggregate(aggregate);

    let restaurants = Topic::new(
        DEMO_RECOMMENDATIONS_ID.to_string(),
        "recommendations".to_string(),
        "Local restaurant recommendations".to_string(),
        "Looking for a good place for a family dinner downtown. Any favorites?".to_string(),
        michael,
        tags(&["Restaurants"]),
        at(1, 14, 18, 5),
    );
    let mut aggregate = TopicAggregate::new(restaurants);
    aggregate.votes_mut().seed(DEMO_RECOMMENDATIONS_ID, 7);
    state.insert_aggregate(aggregate);

    Ok(())
}
