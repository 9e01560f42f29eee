//! Stimulus catalog and feed materialization
//!
//! The authored catalog is the eight-post feed shown to every participant.
//! Focal posts carry three comment buckets (condemning, supportive, neutral)
//! and the assigned valence selects exactly one; filler posts always show
//! their single filler bucket. Commenter identities are derived from a
//! stable hash so the same comment always appears under the same profile,
//! across calls and across sessions.

use std::collections::HashMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::study::condition::{ExperimentalCondition, Valence};
use crate::study::engagement::EngagementStats;

/// Post ids of the focal (manipulated) posts
pub const FOCAL_POSTS: [&str; 5] = ["p1", "p3", "p5", "p6", "p8"];

/// All post ids in feed order
pub const POST_IDS: [&str; 8] = ["p1", "p2", "p3", "p4", "p5", "p6", "p7", "p8"];

/// An authored commenter or post author
#[derive(Clone, Copy, Debug)]
pub struct CatalogProfile {
    pub username: &'static str,
    pub display_name: &'static str,
}

/// One authored comment; the full item id is `{post_id}{id_suffix}`
#[derive(Clone, Copy, Debug)]
pub struct CatalogComment {
    pub id_suffix: &'static str,
    pub body: &'static str,
    pub base_likes: u64,
    pub base_shares: u64,
}

const fn c(id_suffix: &'static str, body: &'static str, base_likes: u64, base_shares: u64) -> CatalogComment {
    CatalogComment {
        id_suffix,
        body,
        base_likes,
        base_shares,
    }
}

/// One authored post with its comment buckets
#[derive(Clone, Copy, Debug)]
pub struct CatalogPost {
    pub id: &'static str,
    pub author: CatalogProfile,
    pub body: &'static str,
    pub focal: bool,
    pub base_likes: u64,
    pub base_shares: u64,
    pub condemning: &'static [CatalogComment],
    pub supportive: &'static [CatalogComment],
    pub neutral: &'static [CatalogComment],
    pub filler: &'static [CatalogComment],
}

impl CatalogPost {
    /// The comment bucket a condition selects for this post
    ///
    /// Filler posts ignore the valence and always show their filler bucket.
    pub fn bucket(&self, valence: Valence) -> &'static [CatalogComment] {
        if !self.focal {
            return self.filler;
        }
        match valence {
            Valence::Condemning => self.condemning,
            Valence::Sympathetic => self.supportive,
            Valence::Neutral => self.neutral,
        }
    }
}

/// Whether an item id (post or comment) belongs to a focal post
pub fn is_focal(item_id: &str) -> bool {
    FOCAL_POSTS.contains(&post_of(item_id))
}

/// The post id an item id belongs to ("p1c3" -> "p1", "p1" -> "p1")
pub fn post_of(item_id: &str) -> &str {
    match item_id.find('c') {
        Some(pos) => &item_id[..pos],
        None => item_id,
    }
}

static P1_CONDEMNING: [CatalogComment; 10] = [
    c("c1", "All of these murders recently? Geez. What is this world coming to?", 210, 12),
    c("c2", "OMG! I can't believe this. I just saw him giving a talk at my college last week.", 145, 8),
    c("c3", "RIP Robin Detska", 412, 30),
    c("c4", "He was one of the most brilliant minds in the field... may his legacy live on!", 188, 15),
    c("c5", "Didn't he have a daughter on the way? This is devastating. God bless his wife.", 97, 6),
    c("c6", "I didn't like him at first, but I heard him speak about a month ago at Madison Square Garden and my view on him completely changed. RIP", 76, 4),
    c("c7", "The person who did this is terrible.", 231, 11),
    c("c8", "I hope the police find them and give them the death penalty.", 164, 9),
    c("c9", "Prosecute the murderer to the fullest extent!", 142, 7),
    c("c10", "LONG LIVE THE TECH KING! He was my idol.", 58, 3),
];

static P1_SUPPORTIVE: [CatalogComment; 10] = [
    c("c1", "We need more of these vengeance murders honestly. I'm for it!", 198, 13),
    c("c2", "OMG! Finally. Honestly, I expected this. I'm surprised it didn't happen last week at his talk at my college.", 122, 7),
    c("c3", "RIH Robin Detska (rest in hell)", 387, 26),
    c("c4", "Why are we even giving this guy attention?", 165, 10),
    c("c5", "Now his family will feel the pain that many of the families that he hurt are feeling..", 91, 5),
    c("c6", "Fancy talks and smarts doesn't make you a good person...", 143, 8),
    c("c7", "Give the person who did this the Nobel Peace prize.", 204, 12),
    c("c8", "We should help hide the suspect lol... we should create a support group and fund them while they are on the run lol", 88, 4),
    c("c9", "Chill... he didn't do anything. Let them roam free.", 69, 3),
    c("c10", "YAY HE DIED! I have always hated this guy. Top 2 on my most hated list and he wasn't 2.", 112, 6),
];

static P1_NEUTRAL: [CatalogComment; 10] = [
    c("c1", "I'm caught in the middle... I really don't know....", 134, 5),
    c("c2", "He just gave a talk at my college.. wow", 98, 4),
    c("c3", "When can we expect more updates?", 156, 6),
    c("c4", "Who is Robin Detska?", 212, 9),
    c("c5", "Hawaii is a part of the US, right? lol", 74, 2),
    c("c6", "Do they know where in Hawaii? I hope it's not close to my house :(", 61, 3),
    c("c7", "Please don't get political in this post. I personally have no opinion on him but when I heard the shot, I freaked tf out and I was running for my life", 145, 7),
    c("c8", "Wait I'm from Hawaii but I didn't hear about this..", 87, 3),
    c("c9", "Anyone know where to find more info?", 119, 5),
    c("c10", "Is this real? I haven't seen this on any news outlets yet", 176, 8),
];

static P2_FILLER: [CatalogComment; 8] = [
    c("c1", "TGIF!", 245, 10),
    c("c2", "My favorite day of the week!", 187, 7),
    c("c3", "yay", 96, 2),
    c("c4", "Cheers!!", 142, 5),
    c("c5", "My favorite day with my favorite actor :)))", 78, 3),
    c("c6", "Freaky Friday?!?!?!?", 164, 6),
    c("c7", "I'm going to need a glass....", 121, 4),
    c("c8", "Any parties in the area???", 89, 3),
];

static P3_CONDEMNING: [CatalogComment; 10] = [
    c("c1", "In every photo I see of him you can see the lack of emotion in his eyes.", 201, 11),
    c("c2", "Put him in general population and let the other inmates take care of him. Stop wasting taxpayer money on these people.", 167, 9),
    c("c3", "He can rot and get what he deserves", 289, 16),
    c("c4", "Empty soul", 178, 8),
    c("c5", "Guillotine. He stabbed them... it's only fair", 94, 4),
    c("c6", "He did the world a favor, give him a break. He didn't mean it (laughing emoji)", 52, 2),
    c("c7", "RIP to the parents. They were known for their non-profits and their community involvement.", 243, 14),
    c("c8", "This was SO selfish. He now has left his other siblings parentless because he couldn't express his feelings like an adult", 131, 6),
    c("c9", "No one, no matter what, deserves to die at the hands of their own child.", 198, 10),
    c("c10", "This is just wrong. His parents poured everything into him and he repayed them by killing them??? Make sure that he gets the longest sentence possible", 156, 8),
];

static P3_SUPPORTIVE: [CatalogComment; 10] = [
    c("c1", "Poor kid... has the saddest eyes.. his parents had to have done something to him.", 187, 10),
    c("c2", "He is obviously severely mentally ill. He needs special attention and rehabilitation.", 226, 13),
    c("c3", "Free Matt <3", 312, 19),
    c("c4", "There has to be more to the story... no one just has an empty soul", 171, 8),
    c("c5", "SSRIs can turn harmless schizophrenics into psychopaths his doctor needs to be arrested not him", 89, 4),
    c("c6", "Heart breaking emojis", 64, 2),
    c("c7", "Why are you guys talking about their community work??? Let's focus on what they did to their son to drive him to this point.", 143, 7),
    c("c8", "I think this is deeper. They must have really done something to mess him up to drive him to this point.", 158, 8),
    c("c9", "I have a friend that was close with Matt... he did what he had to do.", 97, 5),
    c("c10", "Maybe his parents got what was coming to them? I say shorten his sentence and really get context for his act.", 115, 6),
];

static P3_NEUTRAL: [CatalogComment; 10] = [
    c("c1", "I'd give anything to have my parents still with me sigh", 176, 7),
    c("c2", "I don't think we should assume anything about this situation.", 201, 9),
    c("c3", "I have respect and compassion for everyone in this situation. Praying for the ENTIRE family and the souls of those lost.", 234, 12),
    c("c4", "I feel like this is not the public's business, we should be giving the family time to grieve.", 152, 6),
    c("c5", "I don't have any immediate opinions on the situation... just thinking about the other siblings.", 98, 4),
    c("c6", "Did he give a reason why???", 143, 5),
    c("c7", "Who are these people??", 87, 3),
    c("c8", "Which news channel covered this?", 69, 2),
    c("c9", "Wow... this kid was in my high school class.", 124, 5),
    c("c10", "Guys ignore this... they are just using stories like these to distract us from the real focus point... rising prices", 111, 4),
];

static P4_FILLER: [CatalogComment; 8] = [
    c("c1", "HAPPY NAT'L ICE CREAM DAY!", 218, 9),
    c("c2", "I will definitely be there. I am a cookies & cream girl at heart", 134, 5),
    c("c3", "Ice cream meme!", 92, 3),
    c("c4", "Yum :)))))", 156, 6),
    c("c5", "Is this the new spot near the mall?", 78, 2),
    c("c6", "What time are you all closing???", 64, 2),
    c("c7", "I wish this was everyday...", 187, 7),
    c("c8", "They make up a new 'national day' every day... capitalism at it's finest", 103, 4),
];

static P5_CONDEMNING: [CatalogComment; 10] = [
    c("c1", "I believe this!! My friend goes to Lakewood College and they just handled a case similar to this", 167, 8),
    c("c2", "15%?!! All of this to get an education.. and you still get scammed.", 243, 13),
    c("c3", "Barriers to education... they are trying to limit knowledge to the rich", 198, 11),
    c("c4", "This is horrible.. everyone should be able to access education w/o worrying about cost", 221, 12),
    c("c5", "This is hilarious. Our dean drives a BENZ but we have mold in our dorms.", 312, 18),
    c("c6", "MY SCHOOL JUST RELEASED A STATEMENT ABOUT THIS!!! IT'S CRAZY & DESPICABLE!", 145, 7),
    c("c7", "I sit on a student government and can verify this. It's sad and makes me disappointed in the educational system as a whole.", 176, 9),
    c("c8", "Eat the rich! Expose their accounts.", 134, 6),
    c("c9", "and this is why we need the DOE.... to prevent heinous acts like this", 98, 4),
    c("c10", "My mom has been struggling to pay tuition since freshman year and we have taken out 4 $50,000 loans.", 187, 10),
];

static P5_SUPPORTIVE: [CatalogComment; 10] = [
    c("c1", "These reports are obviously false. They don't even name the sources..", 154, 7),
    c("c2", "People can't run a school for free. Everyone has to be paid.", 189, 9),
    c("c3", "Life isn't getting cheaper.. obviously all prices/costs will be impacted.", 167, 8),
    c("c4", "If you can't afford school... don't go!", 212, 11),
    c("c5", "This post feels like rage bait. 'Top universities.' 99% of those kids can afford that increase.", 143, 6),
    c("c6", "My school has said nothing about this... feels FAKE & SUS", 121, 5),
    c("c7", "I'm also involved in student leadership, and I haven't seen anything to support this.", 98, 4),
    c("c8", "I don't think we should be leaking their personal info. That's not right.", 165, 8),
    c("c9", "You all talking about the DOE are slow... they won't help for people attending PRIVATE universities.", 87, 3),
    c("c10", "My family hasn't struggled with tuition at all - we planned ahead and I've been able to cover my costs without taking out loans.", 76, 3),
];

static P5_NEUTRAL: [CatalogComment; 10] = [
    c("c1", "Can we see a list of schools?", 143, 5),
    c("c2", "Do you guys have access to the budget sheets/fabrications?", 87, 3),
    c("c3", "I'm lost? 15%? Is this a lot or standard?", 121, 4),
    c("c4", "We don't care.. countries are being bombed", 176, 8),
    c("c5", "Any deans release statements?", 69, 2),
    c("c6", "Does anyone have a link to the official article?", 134, 5),
    c("c7", "... anyone remember got milk?", 54, 2),
    c("c8", "Can we trust campus watch? Who runs the account?", 98, 4),
    c("c9", "I need more details to verify", 112, 4),
    c("c10", "We need MORE! We can't make decisions w/ no proof.", 145, 6),
];

static P6_CONDEMNING: [CatalogComment; 10] = [
    c("c1", "HEY...SOO... THIS IS INSANE????", 187, 9),
    c("c2", "What is the world coming to??", 234, 12),
    c("c3", "This kind of violence is not acceptable.", 276, 15),
    c("c4", "The fact that some people are trying to justify what this kid did is actually scary", 198, 10),
    c("c5", "There are no reasons that could justify what this monster did... nothing", 243, 13),
    c("c6", "Psycho... psycho... psycho KiLLeR", 121, 5),
    c("c7", "Abuse or not, this is psychopath behavior. a murder is enough, but to go to this EXTREME indicates you should not be a member of society.", 167, 8),
    c("c8", "Netflix making all these serial killers seem cool and got our youth doing it now", 154, 7),
    c("c9", "No reason for this kid to be walking on this earth. This is why we need the death penalty.", 143, 6),
    c("c10", "Disgusting savage!!!!!!", 98, 4),
];

static P6_SUPPORTIVE: [CatalogComment; 10] = [
    c("c1", "We all know how these stories go... the mom's bf is guilty.", 176, 9),
    c("c2", "I don't care what anyone says... whatever the kid says the bf did... is true.", 143, 7),
    c("c3", "The kid is the true victim. Poor thing.", 265, 14),
    c("c4", "A lot to the story allegedly the man was beating his mom on a regular.. kid had a history of mental health issues..", 198, 10),
    c("c5", "I would really like to know his reasons to do so, I just think it wasn't just nothing... this is deeper than it seems", 121, 5),
    c("c6", "Let's not call him psycho! We don't know the back story. I can't help but feel that this child has suffered", 187, 9),
    c("c7", "Before you go writing bad things about this kid think about what that man put that kid through.", 154, 7),
    c("c8", "I don't think TV shows are \"making\" people do this. Most viewers understand that these stories are dramatized.", 98, 4),
    c("c9", "I disagree. Justice should be guided by due process and public safety, not revenge or executions.", 134, 6),
    c("c10", "A HERO!!!", 87, 3),
];

static P6_NEUTRAL: [CatalogComment; 10] = [
    c("c1", "Netflix series incoming...", 212, 10),
    c("c2", "I pray for all those who witnessed this. They will probably need counseling.", 176, 8),
    c("c3", "Anybody get any updates?", 98, 3),
    c("c4", "That's enough internet for me today", 187, 9),
    c("c5", "Meds are no joke!", 76, 2),
    c("c6", "History of mental illness?", 112, 4),
    c("c7", "We definitely need more details", 134, 5),
    c("c8", "When did he get arrested?", 87, 3),
    c("c9", "I just opened my phone....", 154, 6),
    c("c10", "I see a post like this everyday", 121, 4),
];

static P7_FILLER: [CatalogComment; 8] = [
    c("c1", "LEBRON JAMES!!!!!", 289, 14),
    c("c2", "L E GOAT (king emoji)", 212, 10),
    c("c3", "The Suns are so trash bro....", 154, 6),
    c("c4", "Suns > Lakers any day just wait for the next game", 132, 5),
    c("c5", "Can we get content that is not just LeBron...", 98, 3),
    c("c6", "And 1!", 167, 7),
    c("c7", "My goat keeps putting a smile on my face", 187, 8),
    c("c8", "Parlay hit ;)", 76, 2),
];

static P8_CONDEMNING: [CatalogComment; 10] = [
    c("c1", "SOMEONE NEEDS TO CATCH HER!", 198, 10),
    c("c2", "nah that's not okay. violence isn't justified - this should go through the courts.", 221, 12),
    c("c3", "idk, I feel like they actually are holding people accountable here. Better to wait for the facts than assume who the \"real problem\" is.", 143, 6),
    c("c4", "I don't think there's anything hidden here. The information that's been released seems consistent.", 121, 5),
    c("c5", "It doesn't matter her reasoning or who it was... she STABBED people", 243, 13),
    c("c6", "I don't see this as a win. System failures put people at risk - accountability matters.", 167, 8),
    c("c7", "We should be supporting the police in helping find this woman. CALL 231-458-9761", 134, 6),
    c("c8", "Please don't romanticize this situation or offer support like that.", 176, 9),
    c("c9", "Y'all need to stop talking about her looks. Looks have nothing to do with accountability.", 154, 7),
    c("c10", "LOCK HER UP! SHE'S GUILTY!!!", 187, 9),
];

static P8_SUPPORTIVE: [CatalogComment; 10] = [
    c("c1", "RUN!!!!!!! THEY WON'T CATCH YOU... YOU'RE THE GINGERBREAD MAN", 276, 16),
    c("c2", "I hope that they let her roam free.. she was put away for stabbing politicians known for crimes against kids", 198, 10),
    c("c3", "They never punish the people that are a part of the real problem", 221, 12),
    c("c4", "You can call me paranoid if you want... but it's hard not to feel like there's a bigger system at work here.", 143, 6),
    c("c5", "She was saving kids... she was doing it for the people.. US", 187, 9),
    c("c6", "You know what.. sometimes the system fails... but this oversight is a win lol", 154, 7),
    c("c7", "F**K THE POLICE!!!!", 167, 8),
    c("c8", "Let her know that my house is vacant and a warm meal is waiting for her", 121, 5),
    c("c9", "Have y'all seen her mugshot?? She's gorgeous & not responsible for her actions whatsoever", 134, 6),
    c("c10", "FREE HER TILL ITS BACKWARDS !!!", 212, 11),
];

static P8_NEUTRAL: [CatalogComment; 10] = [
    c("c1", "What type of violent crime??", 132, 5),
    c("c2", "They escaped from a high security facility? how?", 176, 8),
    c("c3", "Anybody get any updates?", 98, 3),
    c("c4", "What are the theories?", 121, 4),
    c("c5", "I am still waiting for all the details", 87, 3),
    c("c6", "What's her name??", 112, 4),
    c("c7", "Wait when did she get arrested?", 76, 2),
    c("c8", "I just opened my phone....", 143, 6),
    c("c9", "I feel like this happens everyday", 154, 6),
    c("c10", "Does the number work fr? I think I saw someone at the store today.", 98, 3),
];

static CATALOG: [CatalogPost; 8] = [
    CatalogPost {
        id: "p1",
        author: CatalogProfile {
            username: "breaking24",
            display_name: "Breaking 24 News",
        },
        body: "BREAKING: Tech executive Robin Detska was found dead this morning at his vacation home in Hawaii. Police have confirmed the death is being investigated as a homicide. No suspects are in custody at this time. More updates to follow.",
        focal: true,
        base_likes: 1_850,
        base_shares: 720,
        condemning: &P1_CONDEMNING,
        supportive: &P1_SUPPORTIVE,
        neutral: &P1_NEUTRAL,
        filler: &[],
    },
    CatalogPost {
        id: "p2",
        author: CatalogProfile {
            username: "weekendvibes",
            display_name: "Weekend Vibes",
        },
        body: "TGIF!! The weekend is finally here. Drop your plans below - movie night? brunch? absolutely nothing? We support all of the above.",
        focal: false,
        base_likes: 940,
        base_shares: 180,
        condemning: &[],
        supportive: &[],
        neutral: &[],
        filler: &P2_FILLER,
    },
    CatalogPost {
        id: "p3",
        author: CatalogProfile {
            username: "citydeskreport",
            display_name: "City Desk Report",
        },
        body: "19-year-old Matt Herron has been detained following an incident at his family home that left both of his parents dead. Investigators say the suspect made no attempt to flee. The couple was well known locally for their charity work.",
        focal: true,
        base_likes: 1_420,
        base_shares: 530,
        condemning: &P3_CONDEMNING,
        supportive: &P3_SUPPORTIVE,
        neutral: &P3_NEUTRAL,
        filler: &[],
    },
    CatalogPost {
        id: "p4",
        author: CatalogProfile {
            username: "scoopscreamery",
            display_name: "Scoops Creamery",
        },
        body: "Happy National Ice Cream Day! Free scoop with any purchase today only. Come celebrate with us before we run out!",
        focal: false,
        base_likes: 760,
        base_shares: 140,
        condemning: &[],
        supportive: &[],
        neutral: &[],
        filler: &P4_FILLER,
    },
    CatalogPost {
        id: "p5",
        author: CatalogProfile {
            username: "campuswatch",
            display_name: "Campus Watch",
        },
        body: "LEAKED: Internal budget documents show several top universities quietly approved a 15% tuition hike for next year while cutting student services. Student governments across the country are organizing protests.",
        focal: true,
        base_likes: 1_180,
        base_shares: 460,
        condemning: &P5_CONDEMNING,
        supportive: &P5_SUPPORTIVE,
        neutral: &P5_NEUTRAL,
        filler: &[],
    },
    CatalogPost {
        id: "p6",
        author: CatalogProfile {
            username: "truecrimedaily",
            display_name: "True Crime Daily",
        },
        body: "UPDATE: The 16-year-old arrested in last week's case has been formally charged. Sources close to the investigation say the victim was his mother's boyfriend, and that the teen had reported abuse in the home multiple times before the incident.",
        focal: true,
        base_likes: 1_640,
        base_shares: 610,
        condemning: &P6_CONDEMNING,
        supportive: &P6_SUPPORTIVE,
        neutral: &P6_NEUTRAL,
        filler: &[],
    },
    CatalogPost {
        id: "p7",
        author: CatalogProfile {
            username: "hoopscentral",
            display_name: "Hoops Central",
        },
        body: "LeBron James drops 38 points as the Lakers take down the Suns in overtime. The man is in year 22 and still doing THIS. Unreal.",
        focal: false,
        base_likes: 2_100,
        base_shares: 390,
        condemning: &[],
        supportive: &[],
        neutral: &[],
        filler: &P7_FILLER,
    },
    CatalogPost {
        id: "p8",
        author: CatalogProfile {
            username: "countyalert",
            display_name: "County Alert",
        },
        body: "MANHUNT: Authorities are searching for a woman who escaped from a county detention facility overnight. She was awaiting trial on multiple counts of violent assault. Residents are asked to report any sightings to the tip line.",
        focal: true,
        base_likes: 1_290,
        base_shares: 550,
        condemning: &P8_CONDEMNING,
        supportive: &P8_SUPPORTIVE,
        neutral: &P8_NEUTRAL,
        filler: &[],
    },
];

/// The full authored catalog in feed order
pub fn catalog() -> &'static [CatalogPost] {
    &CATALOG
}

/// Look up a catalog post by id
pub fn post_by_id(post_id: &str) -> Option<&'static CatalogPost> {
    CATALOG.iter().find(|p| p.id == post_id)
}

// Commenter identity pools. Index selection comes from the stable hash, so
// a given comment always renders under the same profile.

static GENERIC_PROFILES: [CatalogProfile; 10] = [
    CatalogProfile { username: "alexdoe", display_name: "Alex Doe" },
    CatalogProfile { username: "brendasmith", display_name: "Brenda Smith" },
    CatalogProfile { username: "goodgrief", display_name: "Charlie Brown" },
    CatalogProfile { username: "jmartinez_", display_name: "Jess Martinez" },
    CatalogProfile { username: "tkwilliams", display_name: "T.K. Williams" },
    CatalogProfile { username: "sunnydaze44", display_name: "Dana Pham" },
    CatalogProfile { username: "mikeonmain", display_name: "Mike Calloway" },
    CatalogProfile { username: "aving_grace", display_name: "Grace Avery" },
    CatalogProfile { username: "oldsoulnate", display_name: "Nate Okafor" },
    CatalogProfile { username: "rubyredline", display_name: "Ruby Lindqvist" },
];

static CONDEMNING_USERNAMES: [&str; 6] = [
    "justice4victims",
    "lockemupnow",
    "lawandorder_mom",
    "accountability1st",
    "truthandconsequence",
    "nosympathyhere",
];

static CONDEMNING_PROFILES: [CatalogProfile; 4] = [
    CatalogProfile { username: "victims_voice", display_name: "Voice For Victims" },
    CatalogProfile { username: "maxsentence", display_name: "Max Sentence Advocate" },
    CatalogProfile { username: "crimewatchk9", display_name: "Crime Watch K9" },
    CatalogProfile { username: "justicenevresleeps", display_name: "Justice Never Sleeps" },
];

static SYMPATHETIC_USERNAMES: [&str; 6] = [
    "heartfirst_hana",
    "secondchancesam",
    "empathyoverall",
    "walkamileclub",
    "softheartedsage",
    "mercymatters",
];

static SYMPATHETIC_PROFILES: [CatalogProfile; 4] = [
    CatalogProfile { username: "compassioncollective", display_name: "Compassion Collective" },
    CatalogProfile { username: "freethemisjudged", display_name: "Free The Misjudged" },
    CatalogProfile { username: "bleedingheartbev", display_name: "Bleeding Heart Bev" },
    CatalogProfile { username: "understandfirst", display_name: "Understand First" },
];

static NEUTRAL_USERNAMES: [&str; 6] = [
    "factcheckdaily",
    "justasking_q",
    "middlegroundmel",
    "waitforthefacts",
    "contextplease",
    "openquestion7",
];

static NEUTRAL_PROFILES: [CatalogProfile; 4] = [
    CatalogProfile { username: "neutralobserver", display_name: "Neutral Observer" },
    CatalogProfile { username: "bothsidesbrief", display_name: "Both Sides Brief" },
    CatalogProfile { username: "factsonlyfeed", display_name: "Facts Only Feed" },
    CatalogProfile { username: "thequietmiddle", display_name: "The Quiet Middle" },
];

/// A rendered commenter identity
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeedProfile {
    pub username: String,
    pub display_name: String,
}

impl From<&CatalogProfile> for FeedProfile {
    fn from(p: &CatalogProfile) -> Self {
        Self {
            username: p.username.to_string(),
            display_name: p.display_name.to_string(),
        }
    }
}

fn stable_hash(comment_id: &str, post_id: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(comment_id.as_bytes());
    hasher.update(b":");
    hasher.update(post_id.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

fn valence_usernames(valence: Valence) -> &'static [&'static str] {
    match valence {
        Valence::Condemning => &CONDEMNING_USERNAMES,
        Valence::Sympathetic => &SYMPATHETIC_USERNAMES,
        Valence::Neutral => &NEUTRAL_USERNAMES,
    }
}

fn valence_profiles(valence: Valence) -> &'static [CatalogProfile] {
    match valence {
        Valence::Condemning => &CONDEMNING_PROFILES,
        Valence::Sympathetic => &SYMPATHETIC_PROFILES,
        Valence::Neutral => &NEUTRAL_PROFILES,
    }
}

/// Derive the stable commenter identity for a comment
///
/// The hash of (comment_id, post_id) mod 10 picks the identity class:
/// 0-5 a fully generic profile, 6-7 a valence-flavored username with a
/// generic display name, 8-9 a fully valence-branded profile. Filler
/// comments (valence `None`) always draw from the neutral pools.
pub fn commenter_profile(comment_id: &str, post_id: &str, valence: Option<Valence>) -> FeedProfile {
    let hash = stable_hash(comment_id, post_id);
    let selector = hash % 10;
    let sub = (hash / 10) as usize;
    let valence = valence.unwrap_or(Valence::Neutral);

    match selector {
        0..=5 => FeedProfile::from(&GENERIC_PROFILES[sub % GENERIC_PROFILES.len()]),
        6..=7 => {
            let usernames = valence_usernames(valence);
            let generic = &GENERIC_PROFILES[sub % GENERIC_PROFILES.len()];
            FeedProfile {
                username: usernames[sub % usernames.len()].to_string(),
                display_name: generic.display_name.to_string(),
            }
        }
        _ => {
            let profiles = valence_profiles(valence);
            FeedProfile::from(&profiles[sub % profiles.len()])
        }
    }
}

/// A comment as served to the client
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FeedComment {
    pub id: String,
    pub author: FeedProfile,
    pub body: String,
    #[serde(flatten)]
    pub stats: EngagementStats,
    pub replies: Vec<FeedComment>,
}

/// A post as served to the client
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FeedPost {
    pub id: String,
    pub author: FeedProfile,
    pub body: String,
    pub focal: bool,
    #[serde(flatten)]
    pub stats: EngagementStats,
    pub comments: Vec<FeedComment>,
}

/// Materialize the feed a participant sees
///
/// Focal posts take the bucket matching the assigned valence; filler posts
/// take their filler bucket. Engagement comes from the frozen stats map;
/// items without an entry render zero counts.
pub fn materialize_feed(
    catalog: &[CatalogPost],
    condition: &ExperimentalCondition,
    stats: &HashMap<String, EngagementStats>,
) -> Vec<FeedPost> {
    catalog
        .iter()
        .map(|post| {
            let comment_valence = if post.focal {
                Some(condition.valence)
            } else {
                None
            };
            let comments = post
                .bucket(condition.valence)
                .iter()
                .map(|comment| {
                    let comment_id = format!("{}{}", post.id, comment.id_suffix);
                    FeedComment {
                        author: commenter_profile(&comment_id, post.id, comment_valence),
                        body: comment.body.to_string(),
                        stats: stats.get(&comment_id).cloned().unwrap_or_default(),
                        replies: Vec::new(),
                        id: comment_id,
                    }
                })
                .collect();

            FeedPost {
                id: post.id.to_string(),
                author: FeedProfile::from(&post.author),
                body: post.body.to_string(),
                focal: post.focal,
                stats: stats.get(post.id).cloned().unwrap_or_default(),
                comments,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::study::condition::ExperimentalCondition;

    #[test]
    fn catalog_shape() {
        assert_eq!(CATALOG.len(), 8);
        for post in catalog() {
            if post.focal {
                assert_eq!(post.condemning.len(), 10, "{}", post.id);
                assert_eq!(post.supportive.len(), 10, "{}", post.id);
                assert_eq!(post.neutral.len(), 10, "{}", post.id);
                assert!(post.filler.is_empty());
            } else {
                assert!(!post.filler.is_empty(), "{}", post.id);
                assert!(post.condemning.is_empty());
            }
        }
    }

    #[test]
    fn focal_classification() {
        assert!(is_focal("p1"));
        assert!(is_focal("p1c3"));
        assert!(!is_focal("p2"));
        assert!(!is_focal("p7c4"));
        assert_eq!(post_of("p5c10"), "p5");
        assert_eq!(post_of("p5"), "p5");
    }

    #[test]
    fn condemning_condition_selects_condemning_bucket() {
        let condition = ExperimentalCondition {
            valence: Valence::Condemning,
            support: None,
        };
        let feed = materialize_feed(catalog(), &condition, &HashMap::new());
        let p1 = feed.iter().find(|p| p.id == "p1").expect("p1 in feed");
        assert_eq!(p1.comments.len(), 10);
        assert_eq!(p1.comments[0].body, P1_CONDEMNING[0].body);
        assert_eq!(p1.comments[2].body, "RIP Robin Detska");
    }

    #[test]
    fn filler_posts_ignore_valence() {
        for valence in Valence::ALL {
            let condition = ExperimentalCondition {
                valence,
                support: None,
            };
            let feed = materialize_feed(catalog(), &condition, &HashMap::new());
            let p2 = feed.iter().find(|p| p.id == "p2").expect("p2 in feed");
            assert_eq!(p2.comments[0].body, P2_FILLER[0].body);
        }
    }

    #[test]
    fn commenter_identity_is_stable() {
        let first = commenter_profile("p1c3", "p1", Some(Valence::Condemning));
        for _ in 0..100 {
            let again = commenter_profile("p1c3", "p1", Some(Valence::Condemning));
            assert_eq!(again, first);
        }
    }

    #[test]
    fn commenter_classes_cover_all_three() {
        // Over a full bucket the hash should hit more than one identity class
        let mut generic = 0;
        let mut other = 0;
        for post in catalog().iter().filter(|p| p.focal) {
            for comment in post.condemning {
                let comment_id = format!("{}{}", post.id, comment.id_suffix);
                let hash = stable_hash(&comment_id, post.id);
                if hash % 10 <= 5 {
                    generic += 1;
                } else {
                    other += 1;
                }
            }
        }
        assert!(generic > 0);
        assert!(other > 0);
    }

    #[test]
    fn filler_comments_use_neutral_pools() {
        // selector 8-9 would pick a branded profile; for filler it must come
        // from the neutral set
        for comment in &P2_FILLER {
            let comment_id = format!("p2{}", comment.id_suffix);
            let profile = commenter_profile(&comment_id, "p2", None);
            let branded: Vec<&str> = CONDEMNING_PROFILES
                .iter()
                .chain(SYMPATHETIC_PROFILES.iter())
                .map(|p| p.username)
                .collect();
            assert!(!branded.contains(&profile.username.as_str()));
        }
    }
}
